pub mod normalize;
pub mod paginate;
pub mod probe;
pub mod reconcile;
pub mod roles;
pub mod scheduler;
pub mod service;

pub use scheduler::SyncScheduler;
pub use service::{EntityCounts, SyncOptions, SyncReport, SyncService};
