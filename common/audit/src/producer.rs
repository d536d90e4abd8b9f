use crate::{AuditActor, AuditError, AuditEvent, AuditResult, AuditSeverity, AUDIT_EVENT_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Anything that can durably (or best-effort) receive an [`AuditEvent`].
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn send(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// Drops every event. Used when no audit transport is configured.
#[derive(Clone, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn send(&self, _event: &AuditEvent) -> AuditResult<()> {
        Ok(())
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
#[derive(Clone)]
pub struct KafkaAuditSink {
    producer: rdkafka::producer::FutureProducer,
    topic: String,
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
impl KafkaAuditSink {
    pub fn new(producer: rdkafka::producer::FutureProducer, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
#[async_trait]
impl AuditSink for KafkaAuditSink {
    async fn send(&self, event: &AuditEvent) -> AuditResult<()> {
        use rdkafka::producer::FutureRecord;
        use std::time::Duration;

        let serialized =
            serde_json::to_vec(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let key = event.event_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(&serialized);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| AuditError::Sink(err.to_string()))?;
        Ok(())
    }
}

#[derive(Default)]
struct BufferCounters {
    queued: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
}

pub struct AuditSnapshot {
    pub queued: u64,
    pub emitted: u64,
    pub dropped: u64,
}

/// Wraps an [`AuditSink`] with exposed counters so a service can surface
/// `queued`/`emitted`/`dropped` on an internal metrics endpoint.
#[derive(Clone)]
pub struct BufferedAuditProducer<S: AuditSink> {
    sink: Arc<S>,
    source_service: &'static str,
    counters: Arc<BufferCounters>,
}

impl<S: AuditSink> BufferedAuditProducer<S> {
    pub fn new(sink: S, source_service: &'static str) -> Self {
        Self {
            sink: Arc::new(sink),
            source_service,
            counters: Arc::new(BufferCounters::default()),
        }
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            queued: self.counters.queued.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn emit(
        &self,
        actor: AuditActor,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        action: impl Into<String>,
        severity: AuditSeverity,
        trace_id: Option<Uuid>,
        payload: serde_json::Value,
        meta: serde_json::Value,
    ) -> AuditResult<AuditEvent> {
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            event_version: AUDIT_EVENT_VERSION,
            actor,
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            occurred_at: Utc::now(),
            source_service: self.source_service.to_string(),
            severity,
            trace_id,
            payload,
            meta,
        };
        match self.sink.send(&event).await {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                Ok(event)
            }
            Err(err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, action = %event.action, "failed to emit audit event");
                Err(err)
            }
        }
    }
}

pub fn extract_actor_from_headers(
    headers: &axum::http::HeaderMap,
    claims_raw: &serde_json::Value,
    subject: uuid::Uuid,
) -> AuditActor {
    use axum::http::HeaderMap;
    fn header_str(map: &HeaderMap, name: &str) -> Option<String> {
        map.get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
    let mut actor = AuditActor { id: Some(subject), name: None, email: None };
    actor.name = claims_raw.get("name").and_then(|v| v.as_str()).map(|s| s.to_string());
    actor.email = claims_raw.get("email").and_then(|v| v.as_str()).map(|s| s.to_string());
    if let Some(v) = header_str(headers, "X-User-ID").and_then(|s| uuid::Uuid::parse_str(&s).ok()) {
        actor.id = Some(v);
    }
    if let Some(v) = header_str(headers, "X-User-Name") {
        actor.name = Some(v);
    }
    if let Some(v) = header_str(headers, "X-User-Email") {
        actor.email = Some(v);
    }
    actor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_counts_as_emitted() {
        let producer = BufferedAuditProducer::new(NoopAuditSink, "lead-broker-gateway");
        producer
            .emit(
                AuditActor::default(),
                "lead",
                Some(Uuid::new_v4()),
                "webhook_rejected",
                AuditSeverity::Warning,
                None,
                serde_json::json!({}),
                serde_json::json!({}),
            )
            .await
            .expect("noop sink never fails");
        let snap = producer.snapshot();
        assert_eq!(snap.queued, 1);
        assert_eq!(snap.emitted, 1);
        assert_eq!(snap.dropped, 0);
    }
}
