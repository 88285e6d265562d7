pub mod aggregation;
pub mod classifier;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod events;
pub mod host;
pub mod ipc;
pub mod scoring;
pub mod session_manager;
pub mod sync;

pub use aggregation::AggregationStore;
pub use classifier::{ClassificationResult, ClassificationSource, Classifier};
pub use config::Config;
pub use daemon::Daemon;
pub use dispatcher::{Dispatch, Dispatcher};
pub use events::{AlarmKind, BrowserEvent, Outbound, Request};
pub use session_manager::{ActiveSession, IdleState, SessionManager, TabError, TabInfo};
pub use sync::{FinalizeOutcome, SessionFinalizer, SyncStatus};
