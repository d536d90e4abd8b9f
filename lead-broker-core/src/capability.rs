use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::model::Lead;

/// Injected wall clock. Lets tests pin `now()` instead of reading the
/// system clock, and keeps the dedup window and billing window
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Injected id generation, kept separate from `Uuid::new_v4()` calls so
/// tests can assert on deterministic ids.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// A lead has been assigned (or re-assigned) to an agency and is ready
/// for device-token resolution and push delivery by the collaborator
/// that owns the mobile transport.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub lead: Lead,
    pub agency_id: Uuid,
}

/// Fire-and-forget delivery capability. The core enqueues and moves on;
/// it never awaits delivery and a failure here never rolls back an
/// assignment that already committed.
pub trait Notifier: Send + Sync {
    fn enqueue(&self, event: NotificationEvent);
}

/// Drops every event. Useful for tests and for deployments that run
/// without a push transport configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn enqueue(&self, _event: NotificationEvent) {}
}

/// Every state transition and webhook reception the pipeline and
/// lifecycle controller produce is routed through this capability so
/// the hosting binary decides where audit entries actually land.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, action: &str, entity_id: Option<Uuid>, payload: Value);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditRecorder;

#[async_trait]
impl AuditRecorder for NoopAuditRecorder {
    async fn record(&self, _action: &str, _entity_id: Option<Uuid>, _payload: Value) {}
}
