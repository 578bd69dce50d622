//! In-process metrics aggregation and hash-chained audit emission.

pub mod audit;
pub mod metrics;

pub use audit::{verify_chain, AuditWriter, ChainedAuditSink, ChainedRecord, InMemoryAuditWriter};
pub use metrics::{MetricsCollector, MetricsSnapshot, ProviderSnapshot, RequestTypeSnapshot};

pub mod prelude {
    pub use crate::audit::{AuditWriter, ChainedAuditSink};
    pub use crate::metrics::MetricsCollector;
}
