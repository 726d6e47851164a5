pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod rfm;
pub mod source;

pub use clock::{FixedClock, PinnedClock, ReferenceClock, SystemClock};
pub use domain::customer::{CustomerId, CustomerKey, CustomerRef};
pub use domain::transaction::{LineItem, TransactionId, TransactionRecord};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use rfm::{
    RfmScore, RunDiagnostics, SegmentLabel, SegmentationEngine, SegmentationOptions,
    SegmentationReport, SegmentationRun, WalkInPolicy,
};
pub use source::{
    AnalysisScope, InMemoryTransactionSource, SourceError, TransactionSnapshot, TransactionSource,
};
