pub mod checksum;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod storage;
pub mod sync;
pub mod tee;
pub mod types;
pub mod worklist;

// Re-export primary types for convenience
pub use config::PipelineConfig;
pub use error::{Result, SyncError, TransferStage};
pub use monitor::{MigrationSummary, Monitor, MonitorState, Progress};
pub use pipeline::Pipeline;
pub use report::{InputLine, ReportRecord, ReportWriter};
pub use storage::{
    Destination, KeyLister, LocalStorage, MemoryStorage, ObjectBody, ObjectMeta, Source,
    StoredObject,
};
pub use sync::sync_object;
pub use types::{
    Checksum, ChecksumAlgorithm, OutcomeStatus, SyncOutcome, UnverifiedPolicy, WorkItem,
};
pub use worklist::resume_keys;
