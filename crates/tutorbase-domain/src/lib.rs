pub mod broker;
pub mod checksum;
pub mod dead_letter;
pub mod enrichers;
pub mod enrichment_engine;
pub mod error;
pub mod in_memory_broker;
pub mod in_memory_repository;
pub mod publisher;
pub mod repository;
pub mod stats;
pub mod types;
pub mod validation;
pub mod validation_engine;
pub mod validators;
pub mod worker;

pub use broker::{StreamBroker, StreamEntry, CONSUMER_GROUP, DEAD_LETTER_STREAM};
pub use checksum::payload_checksum;
pub use dead_letter::DeadLetterProducer;
pub use enrichment_engine::EnrichmentEngine;
pub use error::{DomainError, DomainResult, EnrichmentError};
pub use in_memory_broker::InMemoryBroker;
pub use in_memory_repository::InMemoryRecordRepository;
pub use publisher::EnvelopePublisher;
pub use repository::{BatchResult, RecordOutcome, RecordRepository};
pub use stats::{PipelineStats, StatsSnapshot};
pub use types::{
    DeadLetterEntry, EnrichedRecord, Envelope, FailureDetail, FailureReason, Payload, RecordKind,
};
pub use validation::{ValidationIssue, ValidationResult};
pub use validation_engine::ValidationEngine;
pub use worker::{PipelineWorker, WorkerOptions};

#[cfg(any(test, feature = "testing"))]
pub use broker::MockStreamBroker;
#[cfg(any(test, feature = "testing"))]
pub use repository::MockRecordRepository;
