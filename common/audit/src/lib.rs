pub mod model;
pub mod producer;

pub use model::{AuditActor, AuditError, AuditEvent, AuditResult, AuditSeverity, AUDIT_EVENT_VERSION};
pub use producer::{
    extract_actor_from_headers, AuditSink, AuditSnapshot, BufferedAuditProducer, NoopAuditSink,
};
#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
pub use producer::KafkaAuditSink;
