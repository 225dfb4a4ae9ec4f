use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::lms::LmsClient;
use crate::lms::endpoints::{EndpointTemplate, Method};

/// Generic envelope keys, tried before and after the entity's own keys.
const KEYS_BEFORE: &[&str] = &["data"];
const KEYS_AFTER: &[&str] = &["items"];

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no endpoint reachable after {attempts} attempts")]
    AllUnreachable { attempts: usize },

    #[error("no endpoint returned array-shaped data after {attempts} attempts")]
    NoArrayPayload { attempts: usize },
}

#[derive(Debug)]
pub struct ProbeHit {
    pub records: Vec<Value>,
    /// Rendered path of the winning endpoint, recorded in the sync log.
    pub endpoint: String,
    pub pageable: bool,
}

fn envelope_keys<'a>(domain_keys: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
    KEYS_BEFORE
        .iter()
        .chain(domain_keys.iter())
        .chain(KEYS_AFTER.iter())
        .copied()
}

/// Unwrap the known response envelopes around an entity listing.
///
/// Priority: `data`, then the entity's own key(s), then `items`, then the
/// bare body. A lone object carrying none of the envelope keys is treated as
/// a single-record listing. An envelope key holding a non-array, or an empty
/// object, is a shape mismatch and the caller moves to the next candidate.
pub fn unwrap_envelope(body: Value, domain_keys: &[&str]) -> Option<Vec<Value>> {
    match body {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => {
            for key in envelope_keys(domain_keys) {
                match map.remove(key) {
                    Some(Value::Array(records)) => return Some(records),
                    Some(_) => return None,
                    None => {}
                }
            }
            if map.is_empty() {
                None
            } else {
                Some(vec![Value::Object(map)])
            }
        }
        _ => None,
    }
}

/// Walk the candidate templates until one yields array-shaped data.
///
/// Transport errors and non-2xx answers move on to the next candidate, as do
/// unexpected shapes. The first array wins, even an empty one. The failure
/// distinguishes "nothing answered" from "answers were never array-shaped".
pub async fn probe(
    client: &dyn LmsClient,
    templates: &[EndpointTemplate],
    scope: Option<&str>,
    domain_keys: &[&str],
) -> Result<ProbeHit, ProbeError> {
    let mut reached = false;

    for template in templates {
        let path = template.render(scope);
        let result = match template.method {
            Method::Get => client.get(&path).await,
            Method::Post => client.post(&path, &json!({})).await,
        };

        let body = match result {
            Ok(body) => body,
            Err(err) => {
                warn!(endpoint = %path, error = %err, "endpoint probe failed, trying next candidate");
                continue;
            }
        };
        reached = true;

        match unwrap_envelope(body, domain_keys) {
            Some(records) => {
                debug!(endpoint = %path, count = records.len(), "endpoint probe succeeded");
                return Ok(ProbeHit {
                    records,
                    endpoint: path,
                    pageable: template.pageable,
                });
            }
            None => {
                warn!(endpoint = %path, "unexpected payload shape, trying next candidate");
            }
        }
    }

    if reached {
        Err(ProbeError::NoArrayPayload {
            attempts: templates.len(),
        })
    } else {
        Err(ProbeError::AllUnreachable {
            attempts: templates.len(),
        })
    }
}
