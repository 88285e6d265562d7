pub mod analytics;
pub mod client;
pub mod http;
pub mod payload;
pub mod traits;

pub use analytics::{
    generate_insights, productivity_percentage, Grade, GradeInfo, Insight, InsightKind,
    ProductivityMetrics, ScoreReport, TimedActivity,
};
pub use client::BackendClient;
pub use payload::{ActivityRecord, LegacyLog, SessionMetadata, SessionPayload, DEFAULT_USER_ID};
pub use traits::{SessionSink, SyncError};
