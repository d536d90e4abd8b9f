use lead_broker_core::capability::{NotificationEvent, Notifier};
use tokio::sync::mpsc::Sender;
use tracing::warn;

use crate::metrics::GatewayMetrics;

/// Bounded, non-blocking `Notifier` backing spec §4.9/§6's "enqueue and move
/// on" contract. The core never awaits this; `enqueue` is a synchronous
/// `try_send` into a channel a background task drains, the same shape as
/// the teacher's `main.rs` work-queue channel wired to `GatewayMetrics`
/// depth gauges.
///
/// Device-token resolution and the actual push transport are the mobile
/// collaborator's responsibility (spec §1 non-goals); this notifier's
/// receiver only logs delivery attempts, standing in for that transport.
pub struct ChannelNotifier {
    tx: Sender<NotificationEvent>,
    metrics: std::sync::Arc<GatewayMetrics>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<NotificationEvent>, metrics: std::sync::Arc<GatewayMetrics>) -> Self {
        Self { tx, metrics }
    }
}

impl Notifier for ChannelNotifier {
    fn enqueue(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.metrics.record_notification("enqueued"),
            Err(err) => {
                warn!(error = %err, "notification sink full or closed; dropping event");
                self.metrics.record_notification("dropped");
            }
        }
    }
}

/// Drains the channel, standing in for the injected push-notification
/// transport. Logs at info level per delivery; a real deployment would
/// swap this loop for a call into the mobile-push collaborator.
pub async fn run_notification_drain(mut rx: tokio::sync::mpsc::Receiver<NotificationEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::info!(
            lead_id = %event.lead.id,
            agency_id = %event.agency_id,
            territory = %event.lead.territory_key,
            "lead assignment notification delivered"
        );
    }
}
