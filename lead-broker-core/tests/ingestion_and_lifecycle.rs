use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lead_broker_core::capability::{AuditRecorder, Clock, NoopNotifier, Notifier};
use lead_broker_core::fixtures::InMemoryLeadStore;
use lead_broker_core::lifecycle;
use lead_broker_core::model::{Agency, LeadStatus, Portal, PortalStatus, Subscription, SubscriptionStatus, TerritoryCoverage};
use lead_broker_core::pipeline::{ingest_webhook, IngestOutcome, PipelineConfig};
use serde_json::json;
use uuid::Uuid;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct RecordingAudit {
    actions: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl AuditRecorder for RecordingAudit {
    async fn record(&self, action: &str, _entity_id: Option<Uuid>, _payload: serde_json::Value) {
        self.actions.lock().unwrap().push(action.to_string());
    }
}

fn active_portal(code: &str) -> Portal {
    Portal {
        id: Uuid::new_v4(),
        code: code.to_string(),
        status: PortalStatus::Active,
        industry: "non_healthcare".to_string(),
        secret: "s".to_string(),
        field_mapping_override: None,
    }
}

fn agency(industry: &str, territory: &str, quota: u32) -> (Agency, Subscription) {
    let id = Uuid::new_v4();
    (
        Agency { id, name: format!("agency-{id}"), industry: industry.to_string(), active: true },
        Subscription {
            agency_id: id,
            status: SubscriptionStatus::Active,
            territory_coverage: TerritoryCoverage::Codes(vec![territory.to_string()]),
            monthly_lead_quota: Some(quota),
            billing_anchor_day: None,
        },
    )
}

#[tokio::test]
async fn happy_path_assigns_first_agency_in_rotation() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));
    let (agency_a, sub_a) = agency("non_healthcare", "10001", 10);
    let (agency_b, sub_b) = agency("non_healthcare", "10001", 10);
    store.add_agency(agency_a.clone(), sub_a);
    store.add_agency(agency_b, sub_b);

    let clock = FixedClock(Utc::now());
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    let payload = json!({
        "name": "Jane",
        "email": "JANE@X.io",
        "phone": "(555) 111-2222",
        "zipcode": "10001-0042",
    });

    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
        .await
        .expect("pipeline should succeed");

    let lead_id = match outcome {
        IngestOutcome::Created { lead_id } => lead_id,
        other => panic!("expected Created, got {other:?}"),
    };

    let lead = store.lead(lead_id).expect("lead exists");
    assert_eq!(lead.email.as_deref(), Some("jane@x.io"));
    assert_eq!(lead.phone.as_deref(), Some("5551112222"));
    assert_eq!(lead.territory_key, "10001");
    assert_eq!(lead.status, LeadStatus::Assigned);
}

#[tokio::test]
async fn duplicate_within_window_is_suppressed() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));
    let (agency_a, sub_a) = agency("non_healthcare", "10001", 10);
    store.add_agency(agency_a, sub_a);

    let now = Utc::now();
    let clock = FixedClock(now);
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    let first = json!({"name": "Jane", "email": "jane@x.io", "zipcode": "10001"});
    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &first)
        .await
        .expect("first post succeeds");
    let existing_id = match outcome {
        IngestOutcome::Created { lead_id } => lead_id,
        other => panic!("expected Created, got {other:?}"),
    };

    let second = json!({"name": "Jane", "email": "JANE@x.io", "zipcode": "10001"});
    let err = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &second)
        .await
        .unwrap_err();

    match err {
        lead_broker_core::error::CoreError::DuplicateSuppressed { existing_id: dup_id } => {
            assert_eq!(dup_id, existing_id);
        }
        other => panic!("expected DuplicateSuppressed, got {other:?}"),
    }
}

#[tokio::test]
async fn rejection_reroutes_to_next_agency_then_accepts() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));
    let (agency_a, sub_a) = agency("non_healthcare", "10001", 10);
    let (agency_b, sub_b) = agency("non_healthcare", "10001", 10);
    store.add_agency(agency_a.clone(), sub_a);
    store.add_agency(agency_b.clone(), sub_b);

    let now = Utc::now();
    let clock = FixedClock(now);
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    let payload = json!({"name": "Jane", "email": "jane@x.io", "zipcode": "10001"});
    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
        .await
        .unwrap();
    let lead_id = match outcome {
        IngestOutcome::Created { lead_id } => lead_id,
        other => panic!("expected Created, got {other:?}"),
    };

    let lead = store.lead(lead_id).unwrap();
    let assigned_agency = lead.assigned_agency_id.unwrap();

    let reroute = lifecycle::reject(
        &store,
        &notifier,
        &audit,
        lead_id,
        assigned_agency,
        "busy".to_string(),
        config.distribution_retry_max,
        now,
    )
    .await
    .unwrap();

    let reroute_assignment = match reroute {
        lead_broker_core::coordinator::DistributeOutcome::Assigned(a) => a,
        other => panic!("expected re-routed assignment, got {other:?}"),
    };
    assert_ne!(reroute_assignment.agency_id, assigned_agency);

    lifecycle::accept(&store, &audit, lead_id, reroute_assignment.agency_id, now)
        .await
        .expect("second agency can accept");

    let lead = store.lead(lead_id).unwrap();
    assert_eq!(lead.status, LeadStatus::Accepted);

    let assignments = store.assignments_for(lead_id);
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().any(|a| a.status == lead_broker_core::model::AssignmentStatus::Rejected));
    assert!(assignments.iter().any(|a| a.status == lead_broker_core::model::AssignmentStatus::Accepted));
}

#[tokio::test]
async fn no_eligible_agency_yields_unassigned_lead() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));

    let clock = FixedClock(Utc::now());
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    let payload = json!({"name": "Jane", "email": "jane@x.io", "zipcode": "99999"});
    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
        .await
        .unwrap();

    let lead_id = match outcome {
        IngestOutcome::Unassigned { lead_id } => lead_id,
        other => panic!("expected Unassigned, got {other:?}"),
    };
    let lead = store.lead(lead_id).unwrap();
    assert_eq!(lead.status, LeadStatus::Unassigned);
    assert!(store.assignments_for(lead_id).is_empty());
}

#[tokio::test]
async fn at_quota_agency_is_excluded_by_capacity_filter() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));
    let (agency_a, sub_a) = agency("non_healthcare", "10001", 2);
    store.add_agency(agency_a.clone(), sub_a);

    let now = Utc::now();
    let clock = FixedClock(now);
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    for _ in 0..2 {
        let payload = json!({"name": "Jane", "email": format!("{}@x.io", Uuid::new_v4()), "zipcode": "10001"});
        ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
            .await
            .unwrap();
    }

    let payload = json!({"name": "Jane", "email": format!("{}@x.io", Uuid::new_v4()), "zipcode": "10001"});
    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
        .await
        .unwrap();

    match outcome {
        IngestOutcome::Unassigned { lead_id } => {
            assert_eq!(store.lead(lead_id).unwrap().status, LeadStatus::Unassigned);
        }
        other => panic!("expected Unassigned once at quota, got {other:?}"),
    }
}

#[tokio::test]
async fn double_accept_by_same_agency_is_rejected_on_second_call() {
    let store = InMemoryLeadStore::new();
    store.add_portal(active_portal("acme"));
    let (agency_a, sub_a) = agency("non_healthcare", "10001", 10);
    store.add_agency(agency_a.clone(), sub_a);

    let now = Utc::now();
    let clock = FixedClock(now);
    let notifier = NoopNotifier;
    let audit = RecordingAudit::default();
    let config = PipelineConfig::default();

    let payload = json!({"name": "Jane", "email": "jane@x.io", "zipcode": "10001"});
    let outcome = ingest_webhook(&store, &clock, &notifier, &audit, &config, "acme", "s", &payload)
        .await
        .unwrap();
    let lead_id = match outcome {
        IngestOutcome::Created { lead_id } => lead_id,
        other => panic!("expected Created, got {other:?}"),
    };
    let agency_id = store.lead(lead_id).unwrap().assigned_agency_id.unwrap();

    lifecycle::accept(&store, &audit, lead_id, agency_id, now).await.unwrap();

    let err = lifecycle::accept(&store, &audit, lead_id, agency_id, now).await.unwrap_err();
    assert!(matches!(err, lead_broker_core::error::CoreError::AssignmentNotPending));
}
