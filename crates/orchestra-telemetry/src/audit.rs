//! Audit emitter (C14): enqueues audit records onto a bounded queue and
//! batch-flushes them through a hash-chained trail. Queue overflow falls
//! back to a synchronous write (§5 "Backpressure": producers slow down
//! rather than drop an event).

use std::sync::Arc;

use orchestra_core::{AuditEvent, AuditSink};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

/// A `ChainedAuditSink`-internal record pairing the public event with its
/// position in the hash chain.
#[derive(Debug, Clone)]
pub struct ChainedRecord {
    pub event: AuditEvent,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub sequence: u64,
}

/// Downstream persistence for chained records. `orchestra-telemetry`
/// ships an in-memory implementation; a deployment wanting durability
/// wires its own (§1 "durable stores are an opaque AuditSink").
pub trait AuditWriter: Send + Sync {
    fn write(&self, record: ChainedRecord);
}

/// Keeps every record in memory; used by default and by tests. Not
/// meant for production durability.
#[derive(Default)]
pub struct InMemoryAuditWriter {
    records: Mutex<Vec<ChainedRecord>>,
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ChainedRecord> {
        self.records.lock().clone()
    }
}

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: ChainedRecord) {
        self.records.lock().push(record);
    }
}

struct Chain {
    writer: Arc<dyn AuditWriter>,
    previous_hash: Mutex<Option<String>>,
    sequence: std::sync::atomic::AtomicU64,
}

impl Chain {
    fn append(&self, event: AuditEvent) {
        let sequence = self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut previous = self.previous_hash.lock();
        let hash = compute_hash(&event, previous.as_deref(), sequence);
        let record = ChainedRecord {
            event,
            hash: hash.clone(),
            previous_hash: previous.clone(),
            sequence,
        };
        *previous = Some(hash);
        drop(previous);
        self.writer.write(record);
    }
}

fn compute_hash(event: &AuditEvent, previous_hash: Option<&str>, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.category.as_bytes());
    hasher.update(event.message.as_bytes());
    hasher.update(sequence.to_be_bytes());
    if let Some(request_id) = &event.request_id {
        hasher.update(request_id.as_bytes());
    }
    if let Some(previous) = previous_hash {
        hasher.update(previous.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Verify a chain's hash-links in order, recomputing each record's hash
/// against the recorded previous hash. Used by operators and tests to
/// detect tampering.
pub fn verify_chain(records: &[ChainedRecord]) -> bool {
    let mut expected_previous: Option<String> = None;
    for record in records {
        if record.previous_hash != expected_previous {
            return false;
        }
        let recomputed = compute_hash(&record.event, record.previous_hash.as_deref(), record.sequence);
        if recomputed != record.hash {
            return false;
        }
        expected_previous = Some(record.hash.clone());
    }
    true
}

const QUEUE_CAPACITY: usize = 1024;

/// An `orchestra_core::AuditSink` backed by a bounded queue and a
/// background flush task. `record` never blocks the caller under normal
/// load; when the queue is full, it falls back to writing synchronously
/// on the caller's thread so an event is never silently dropped.
pub struct ChainedAuditSink {
    sender: mpsc::Sender<AuditEvent>,
    chain: Arc<Chain>,
}

impl ChainedAuditSink {
    pub fn new(writer: Arc<dyn AuditWriter>) -> Self {
        let chain = Arc::new(Chain {
            writer,
            previous_hash: Mutex::new(None),
            sequence: std::sync::atomic::AtomicU64::new(0),
        });
        let (sender, mut receiver) = mpsc::channel(QUEUE_CAPACITY);

        let flush_chain = chain.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                flush_chain.append(event);
            }
        });

        Self { sender, chain }
    }
}

impl AuditSink for ChainedAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!("audit queue full, writing synchronously");
                self.chain.append(event);
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!("audit queue closed, writing synchronously");
                self.chain.append(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::AuditSeverity;

    #[tokio::test]
    async fn flushed_events_form_a_verifiable_chain() {
        let writer = Arc::new(InMemoryAuditWriter::new());
        let sink = ChainedAuditSink::new(writer.clone());

        for i in 0..5 {
            sink.record(AuditEvent::new("policy", format!("event {i}"), AuditSeverity::Low));
        }

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let records = writer.records();
        assert_eq!(records.len(), 5);
        assert!(verify_chain(&records));
    }

    #[test]
    fn tampering_breaks_verification() {
        let writer = Arc::new(InMemoryAuditWriter::new());
        let chain = Chain {
            writer: writer.clone(),
            previous_hash: Mutex::new(None),
            sequence: std::sync::atomic::AtomicU64::new(0),
        };
        chain.append(AuditEvent::new("a", "first", AuditSeverity::Low));
        chain.append(AuditEvent::new("b", "second", AuditSeverity::Low));

        let mut records = writer.records();
        records[0].event.message = "tampered".to_string();
        assert!(!verify_chain(&records));
    }

    #[tokio::test]
    async fn full_queue_falls_back_to_synchronous_write() {
        let writer = Arc::new(InMemoryAuditWriter::new());
        let sink = ChainedAuditSink::new(writer.clone());

        for i in 0..(QUEUE_CAPACITY + 10) {
            sink.record(AuditEvent::new("policy", format!("event {i}"), AuditSeverity::Low));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(writer.records().len(), QUEUE_CAPACITY + 10);
    }
}
