use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::lms::LmsClient;
use crate::sync::probe::unwrap_envelope;

pub const PAGE_SIZE: usize = 100;

/// Pause between consecutive page requests so a long listing does not hammer
/// the LMS.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Accumulate every page of an `offset`/`limit` listing.
///
/// A page shorter than the page size marks the end of the data. A transport
/// error or unexpected shape mid-way terminates the loop with whatever has
/// been accumulated; pagination is best-effort, not all-or-nothing.
pub async fn fetch_paged(
    client: &dyn LmsClient,
    base_path: &str,
    domain_keys: &[&str],
) -> Vec<Value> {
    let mut accumulated = Vec::new();
    let mut offset = 0;

    loop {
        let separator = if base_path.contains('?') { '&' } else { '?' };
        let path = format!("{base_path}{separator}limit={PAGE_SIZE}&offset={offset}");

        let body = match client.get(&path).await {
            Ok(body) => body,
            Err(err) => {
                warn!(endpoint = %path, error = %err, "page request failed, keeping partial result");
                break;
            }
        };

        let page = match unwrap_envelope(body, domain_keys) {
            Some(records) => records,
            None => {
                warn!(endpoint = %path, "page had unexpected shape, keeping partial result");
                break;
            }
        };

        let page_len = page.len();
        accumulated.extend(page);
        if page_len < PAGE_SIZE {
            break;
        }

        offset += PAGE_SIZE;
        tokio::time::sleep(PAGE_DELAY).await;
    }

    debug!(count = accumulated.len(), "pagination complete");
    accumulated
}
