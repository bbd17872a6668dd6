pub mod feedback_dump;
pub mod heartbeat;
pub mod usage_email;

pub use feedback_dump::{FeedbackDumpHandler, FEEDBACK_COLLECTION, FEEDBACK_DUMP_COLLECTION};
pub use heartbeat::{HeartbeatHandler, HEARTBEAT_COLLECTION};
pub use usage_email::{
    summarize_usage, LoggingNotifier, UsageEmailHandler, UsageNotifier, UsageSummary,
    USAGE_COLLECTION,
};
