use async_trait::async_trait;
use common_audit::{AuditActor, AuditSeverity, AuditSink, BufferedAuditProducer};
use lead_broker_core::capability::AuditRecorder;
use uuid::Uuid;

/// Bridges the core's minimal `AuditRecorder` capability (action, entity,
/// payload) onto the shared `BufferedAuditProducer`, so every pipeline and
/// lifecycle audit call lands in the same durable sink and exposes the
/// same queued/emitted/dropped counters as the rest of the corpus.
pub struct GatewayAuditRecorder<S: AuditSink> {
    producer: BufferedAuditProducer<S>,
}

impl<S: AuditSink> GatewayAuditRecorder<S> {
    pub fn new(producer: BufferedAuditProducer<S>) -> Self {
        Self { producer }
    }

    pub fn snapshot(&self) -> common_audit::AuditSnapshot {
        self.producer.snapshot()
    }
}

#[async_trait]
impl<S: AuditSink> AuditRecorder for GatewayAuditRecorder<S> {
    async fn record(&self, action: &str, entity_id: Option<Uuid>, payload: serde_json::Value) {
        let entity_type = "lead";
        if let Err(err) = self
            .producer
            .emit(AuditActor::default(), entity_type, entity_id, action, AuditSeverity::Info, None, payload, serde_json::json!({}))
            .await
        {
            tracing::warn!(error = %err, action, "failed to record audit event");
        }
    }
}
