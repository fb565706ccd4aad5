//! In-memory implementation of every storage and directory trait.
//!
//! One mutex over the whole state gives the same atomicity guarantee for
//! complete-with-fan-out that the Postgres implementation gets from a
//! transaction. Used by the integration suites and local development.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    AssessorAssignment, EvaluationInstance, EvaluationType, JobPlacement, QuestionResponse,
    RatingEntry, RatingSide,
};

use super::{
    AssignmentDirectory, CreateOutcome, EvaluationFilter, EvaluationStore, OrgDirectory,
    RatingStore, ResponseKey, UserDirectory,
};

#[derive(Default)]
struct Inner {
    evaluations: Vec<EvaluationInstance>,
    ratings: Vec<RatingEntry>,
    responses: Vec<QuestionResponse>,
    assessors_by_org: HashMap<Uuid, Vec<Uuid>>,
    assignments: Vec<AssessorAssignment>,
    placements: HashMap<Uuid, JobPlacement>,
}

/// Shared in-memory store. Cheap to clone via `Arc`; construct once per
/// test or dev process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user as an assessor in the organization's directory.
    pub fn add_assessor(&self, organization_id: Uuid, assessor_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .assessors_by_org
            .entry(organization_id)
            .or_default()
            .push(assessor_id);
    }

    /// Link an assessor to an employee in the assignment directory.
    pub fn assign(&self, organization_id: Uuid, assessor_id: Uuid, employee_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.assignments.push(AssessorAssignment {
            organization_id,
            assessor_id,
            employee_id,
        });
    }

    /// Record an employee's current job placement.
    pub fn place_employee(&self, employee_id: Uuid, job_id: Uuid, department_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.placements.insert(
            employee_id,
            JobPlacement {
                job_id,
                department_id,
            },
        );
    }
}

fn matches_filter(instance: &EvaluationInstance, filter: &EvaluationFilter) -> bool {
    if instance.organization_id != filter.organization_id {
        return false;
    }
    if let Some(employee_id) = filter.employee_id {
        if instance.employee_id != employee_id {
            return false;
        }
    }
    if let Some(assessor_id) = filter.assessor_id {
        if instance.assessor_id != Some(assessor_id) {
            return false;
        }
    }
    if let Some(kind) = filter.kind {
        if instance.kind != kind {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if instance.status != status {
            return false;
        }
    }
    if let Some(cycle_id) = filter.cycle_id {
        if instance.cycle_id != cycle_id {
            return false;
        }
    }
    if filter.settled_only && !instance.status.is_settled() {
        return false;
    }
    true
}

fn assessor_key_taken(inner: &Inner, candidate: &EvaluationInstance) -> Option<usize> {
    inner.evaluations.iter().position(|existing| {
        existing.evaluation_type == EvaluationType::Assessor
            && existing.employee_id == candidate.employee_id
            && existing.assessor_id == candidate.assessor_id
            && existing.kind == candidate.kind
            && existing.cycle_id == candidate.cycle_id
    })
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn fetch(&self, evaluation_id: Uuid) -> Result<Option<EvaluationInstance>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .evaluations
            .iter()
            .find(|e| e.evaluation_id == evaluation_id)
            .cloned())
    }

    async fn create_self(&self, instance: &EvaluationInstance) -> Result<CreateOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.evaluations.iter().find(|e| {
            e.evaluation_type == EvaluationType::SelfReview
                && e.employee_id == instance.employee_id
                && e.kind == instance.kind
                && e.cycle_id == instance.cycle_id
        });
        if let Some(existing) = existing {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        inner.evaluations.push(instance.clone());
        Ok(CreateOutcome::Created(instance.clone()))
    }

    async fn create_assessor(&self, instance: &EvaluationInstance) -> Result<CreateOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = assessor_key_taken(&inner, instance) {
            return Ok(CreateOutcome::Existing(inner.evaluations[slot].clone()));
        }
        inner.evaluations.push(instance.clone());
        Ok(CreateOutcome::Created(instance.clone()))
    }

    async fn save_status(&self, instance: &EvaluationInstance) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .evaluations
            .iter_mut()
            .find(|e| e.evaluation_id == instance.evaluation_id)
        {
            existing.status = instance.status;
            existing.started_at = instance.started_at;
            existing.completed_at = instance.completed_at;
        }
        Ok(())
    }

    async fn complete_with_fanout(
        &self,
        instance: &EvaluationInstance,
        fanout: &[EvaluationInstance],
    ) -> Result<usize> {
        // Single lock section: the status update and every fan-out insert
        // are observed together or not at all.
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .evaluations
            .iter_mut()
            .find(|e| e.evaluation_id == instance.evaluation_id)
        {
            existing.status = instance.status;
            existing.started_at = instance.started_at;
            existing.completed_at = instance.completed_at;
        }

        let mut created = 0;
        for candidate in fanout {
            if assessor_key_taken(&inner, candidate).is_none() {
                inner.evaluations.push(candidate.clone());
                created += 1;
            }
        }
        Ok(created)
    }

    async fn list(&self, filter: &EvaluationFilter) -> Result<Vec<EvaluationInstance>> {
        let inner = self.inner.lock().unwrap();
        let mut results: Vec<EvaluationInstance> = inner
            .evaluations
            .iter()
            .filter(|e| matches_filter(e, filter))
            .cloned()
            .collect();
        results.sort_by_key(|e| e.created_at);
        Ok(results)
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn upsert_rating(&self, entry: &RatingEntry) -> Result<RatingEntry> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.ratings.iter_mut().find(|r| {
            r.evaluation_id == entry.evaluation_id && r.competency_id == entry.competency_id
        }) {
            existing.rating = entry.rating;
            existing.comment = entry.comment.clone();
            return Ok(existing.clone());
        }
        inner.ratings.push(entry.clone());
        Ok(entry.clone())
    }

    async fn ratings_for(&self, evaluation_id: Uuid) -> Result<Vec<RatingEntry>> {
        self.ratings_for_many(&[evaluation_id]).await
    }

    async fn ratings_for_many(&self, evaluation_ids: &[Uuid]) -> Result<Vec<RatingEntry>> {
        let inner = self.inner.lock().unwrap();
        let mut results: Vec<RatingEntry> = inner
            .ratings
            .iter()
            .filter(|r| evaluation_ids.contains(&r.evaluation_id))
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.competency_id
                .cmp(&b.competency_id)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(results)
    }

    async fn upsert_response(
        &self,
        key: &ResponseKey,
        side: RatingSide,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<QuestionResponse> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner.responses.iter_mut().find(|r| {
            r.employee_id == key.employee_id
                && r.cycle_id == key.cycle_id
                && r.question_id == key.question_id
        }) {
            match side {
                RatingSide::Employee => {
                    existing.employee_rating = Some(rating);
                    existing.employee_comment = comment.map(str::to_owned);
                }
                RatingSide::Assessor => {
                    existing.assessor_rating = Some(rating);
                    existing.assessor_comment = comment.map(str::to_owned);
                }
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let mut response = QuestionResponse {
            response_id: Uuid::new_v4(),
            organization_id: key.organization_id,
            employee_id: key.employee_id,
            cycle_id: key.cycle_id,
            question_id: key.question_id,
            employee_rating: None,
            employee_comment: None,
            assessor_rating: None,
            assessor_comment: None,
            created_at: now,
            updated_at: now,
        };
        match side {
            RatingSide::Employee => {
                response.employee_rating = Some(rating);
                response.employee_comment = comment.map(str::to_owned);
            }
            RatingSide::Assessor => {
                response.assessor_rating = Some(rating);
                response.assessor_comment = comment.map(str::to_owned);
            }
        }
        inner.responses.push(response.clone());
        Ok(response)
    }

    async fn responses_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<QuestionResponse>> {
        let inner = self.inner.lock().unwrap();
        let mut results: Vec<QuestionResponse> = inner
            .responses
            .iter()
            .filter(|r| {
                r.organization_id == organization_id
                    && r.employee_id == employee_id
                    && r.cycle_id == cycle_id
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.question_id
                .cmp(&b.question_id)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(results)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn assessor_ids_in_org(&self, organization_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assessors_by_org
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AssignmentDirectory for MemoryStore {
    async fn assessors_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assignments
            .iter()
            .filter(|a| a.organization_id == organization_id && a.employee_id == employee_id)
            .map(|a| a.assessor_id)
            .collect())
    }

    async fn employees_for_assessor(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assignments
            .iter()
            .filter(|a| a.organization_id == organization_id && a.assessor_id == assessor_id)
            .map(|a| a.employee_id)
            .collect())
    }

    async fn is_assigned(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.assignments.iter().any(|a| {
            a.organization_id == organization_id
                && a.assessor_id == assessor_id
                && a.employee_id == employee_id
        }))
    }
}

#[async_trait]
impl OrgDirectory for MemoryStore {
    async fn placements(
        &self,
        _organization_id: Uuid,
        employee_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, JobPlacement>> {
        let inner = self.inner.lock().unwrap();
        Ok(employee_ids
            .iter()
            .filter_map(|id| inner.placements.get(id).map(|p| (*id, *p)))
            .collect())
    }
}
