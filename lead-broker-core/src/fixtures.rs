//! In-memory [`LeadStore`] used by unit tests across this crate and by
//! the gateway's own handler tests. Not wired into production builds.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Agency, Assignment, AssignmentStatus, Lead, LeadStatus, Portal, SequenceCursor, Subscription,
};
use crate::store::{AssignmentCreate, EligibleAgencyRow, LeadStore, NewLead};

#[derive(Default)]
struct State {
    portals: HashMap<String, Portal>,
    agencies: HashMap<Uuid, Agency>,
    subscriptions: Vec<Subscription>,
    leads: HashMap<Uuid, Lead>,
    assignments: HashMap<Uuid, Assignment>,
    cursors: HashMap<String, SequenceCursor>,
}

#[derive(Default)]
pub struct InMemoryLeadStore {
    state: Mutex<State>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_portal(&self, portal: Portal) {
        self.state.lock().unwrap().portals.insert(portal.code.clone(), portal);
    }

    pub fn add_agency(&self, agency: Agency, subscription: Subscription) {
        let mut state = self.state.lock().unwrap();
        state.agencies.insert(agency.id, agency);
        state.subscriptions.push(subscription);
    }

    pub fn lead(&self, lead_id: Uuid) -> Option<Lead> {
        self.state.lock().unwrap().leads.get(&lead_id).cloned()
    }

    pub fn assignments_for(&self, lead_id: Uuid) -> Vec<Assignment> {
        self.state
            .lock()
            .unwrap()
            .assignments
            .values()
            .filter(|a| a.lead_id == lead_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn read_portal_by_code(&self, code: &str) -> CoreResult<Option<Portal>> {
        Ok(self.state.lock().unwrap().portals.get(code).cloned())
    }

    async fn create_lead(&self, lead: NewLead, created_at: DateTime<Utc>) -> CoreResult<Lead> {
        let mut state = self.state.lock().unwrap();
        let record = Lead {
            id: Uuid::new_v4(),
            portal_id: lead.portal_id,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            city: lead.city,
            state: lead.state,
            zipcode: lead.zipcode,
            territory_key: lead.territory_key,
            industry: lead.industry,
            status: LeadStatus::New,
            created_at,
            extra_fields: lead.extra_fields,
            assigned_agency_id: None,
        };
        state.leads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_recent_duplicate(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Lead>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .leads
            .values()
            .filter(|l| l.created_at >= since)
            .find(|l| {
                (email.is_some() && l.email.as_deref() == email) || (phone.is_some() && l.phone.as_deref() == phone)
            })
            .cloned())
    }

    async fn read_lead(&self, lead_id: Uuid) -> CoreResult<Lead> {
        self.state
            .lock()
            .unwrap()
            .leads
            .get(&lead_id)
            .cloned()
            .ok_or(CoreError::LeadNotFound)
    }

    async fn read_eligible_agencies(&self, territory_key: &str) -> CoreResult<Vec<EligibleAgencyRow>> {
        let state = self.state.lock().unwrap();
        let mut rows = Vec::new();
        for sub in &state.subscriptions {
            let active = matches!(
                sub.status,
                crate::model::SubscriptionStatus::Active | crate::model::SubscriptionStatus::Trial
            );
            if !active || !sub.territory_coverage.covers(territory_key) {
                continue;
            }
            let Some(agency) = state.agencies.get(&sub.agency_id) else { continue };
            if !agency.active {
                continue;
            }
            rows.push(EligibleAgencyRow {
                agency_id: agency.id,
                agency_industry: agency.industry.clone(),
                quota: sub.quota(),
                billing_anchor_day: sub.billing_anchor_day,
            });
        }
        Ok(rows)
    }

    async fn read_assignment_count_in_window(&self, agency_id: Uuid, window_start: DateTime<Utc>) -> CoreResult<u32> {
        let state = self.state.lock().unwrap();
        Ok(state
            .assignments
            .values()
            .filter(|a| {
                a.agency_id == agency_id
                    && matches!(a.status, AssignmentStatus::Pending | AssignmentStatus::Accepted)
                    && a.assigned_at >= window_start
            })
            .count() as u32)
    }

    async fn read_sequence_cursor(&self, territory_key: &str) -> CoreResult<Option<SequenceCursor>> {
        Ok(self.state.lock().unwrap().cursors.get(territory_key).cloned())
    }

    async fn create_assignment(&self, req: AssignmentCreate) -> CoreResult<Assignment> {
        let mut state = self.state.lock().unwrap();

        let has_active = state
            .assignments
            .values()
            .any(|a| a.lead_id == req.lead_id && matches!(a.status, AssignmentStatus::Pending | AssignmentStatus::Accepted));
        if has_active {
            return Err(CoreError::AssignmentConflict { lead_id: req.lead_id });
        }

        let current_cursor_holder = state.cursors.get(&req.territory_key).and_then(|c| c.last_assigned_agency_id);
        if current_cursor_holder != req.expected_last_assigned_agency_id {
            return Err(CoreError::CursorConflict { territory_key: req.territory_key });
        }

        let assignment = Assignment {
            id: Uuid::new_v4(),
            lead_id: req.lead_id,
            agency_id: req.agency_id,
            status: AssignmentStatus::Pending,
            method: req.method,
            assigned_at: req.assigned_at,
            accepted_at: None,
            rejected_at: None,
            rejection_reason: None,
        };
        state.assignments.insert(assignment.id, assignment.clone());

        if let Some(lead) = state.leads.get_mut(&req.lead_id) {
            lead.status = LeadStatus::Assigned;
            lead.assigned_agency_id = Some(req.agency_id);
        }

        let counter = state.cursors.get(&req.territory_key).map(|c| c.counter + 1).unwrap_or(1);
        state.cursors.insert(
            req.territory_key.clone(),
            SequenceCursor {
                territory_key: req.territory_key,
                last_assigned_agency_id: Some(req.agency_id),
                last_assigned_at: req.assigned_at,
                counter,
            },
        );

        Ok(assignment)
    }

    async fn update_lead_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
        assigned_agency_id: Option<Uuid>,
    ) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let lead = state.leads.get_mut(&lead_id).ok_or(CoreError::LeadNotFound)?;
        lead.status = status;
        lead.assigned_agency_id = assigned_agency_id;
        Ok(())
    }

    async fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let assignment = state
            .assignments
            .get_mut(&assignment_id)
            .ok_or(CoreError::AssignmentNotPending)?;
        assignment.status = status;
        match status {
            AssignmentStatus::Accepted => assignment.accepted_at = Some(at),
            AssignmentStatus::Rejected => {
                assignment.rejected_at = Some(at);
                assignment.rejection_reason = reason;
            }
            _ => {}
        }
        Ok(())
    }

    async fn read_pending_assignment(&self, lead_id: Uuid) -> CoreResult<Option<Assignment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .assignments
            .values()
            .find(|a| a.lead_id == lead_id && matches!(a.status, AssignmentStatus::Pending | AssignmentStatus::Accepted))
            .cloned())
    }

    async fn read_undistributed_leads(&self, limit: u32) -> CoreResult<Vec<Lead>> {
        let state = self.state.lock().unwrap();
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|l| matches!(l.status, LeadStatus::New) && l.assigned_agency_id.is_none())
            .cloned()
            .collect();
        leads.sort_by_key(|l| l.created_at);
        leads.truncate(limit as usize);
        Ok(leads)
    }

    async fn read_assignments_for_agency(&self, agency_id: Uuid) -> CoreResult<Vec<(Assignment, Lead)>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<(Assignment, Lead)> = state
            .assignments
            .values()
            .filter(|a| a.agency_id == agency_id)
            .filter_map(|a| state.leads.get(&a.lead_id).map(|l| (a.clone(), l.clone())))
            .collect();
        rows.sort_by(|a, b| b.0.assigned_at.cmp(&a.0.assigned_at));
        Ok(rows)
    }
}
