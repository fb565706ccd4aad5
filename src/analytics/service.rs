//! Gap analysis over evaluation populations.
//!
//! The service pulls COMPLETED/REVIEWED instances through the access
//! filter, resolves department/job-role placement at query time (current
//! placement, not historical-as-of-evaluation), groups the population per
//! granularity, and applies the `reduce_gaps` reduction per group.
//!
//! Competency ratings contribute through the instance that owns them, on
//! that instance's side. Appraisal responses are shared rows: the employee
//! columns count when the employee's settled SELF instance is in the
//! population, the assessor columns when at least one settled ASSESSOR
//! instance is, so a shared row is never counted twice within a group.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::access;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    CallerContext, EvaluationInstance, EvaluationKind, JobPlacement, QuestionResponse, RatingSide,
    Role,
};
use crate::store::{AssignmentDirectory, EvaluationFilter, EvaluationStore, OrgDirectory, RatingStore};

use super::gap::{reduce_gaps, DimensionGap, RatingSample};

/// Aggregation level for a gap query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Organization,
    Department,
    JobRole,
    Instance,
}

impl std::str::FromStr for Granularity {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(Granularity::Organization),
            "department" => Ok(Granularity::Department),
            "job_role" => Ok(Granularity::JobRole),
            "instance" => Ok(Granularity::Instance),
            other => Err(WorkflowError::validation(format!(
                "unknown granularity '{other}'"
            ))),
        }
    }
}

/// Narrows the instance population before aggregation. The organization
/// always comes from the caller context.
#[derive(Debug, Clone, Copy)]
pub struct PopulationFilter {
    pub kind: EvaluationKind,
    pub cycle_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

impl PopulationFilter {
    pub fn for_kind(kind: EvaluationKind) -> Self {
        Self {
            kind,
            cycle_id: None,
            employee_id: None,
            department_id: None,
            job_id: None,
        }
    }
}

/// What one group of gap rows describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum GapScope {
    Organization(Uuid),
    Department(Uuid),
    JobRole(Uuid),
    Instance(Uuid),
}

/// Gap rows for one aggregation bucket.
#[derive(Debug, Clone, Serialize)]
pub struct GapGroup {
    pub scope: GapScope,
    pub rows: Vec<DimensionGap>,
}

/// Full result of a gap query.
#[derive(Debug, Clone, Serialize)]
pub struct GapAnalysis {
    pub granularity: Granularity,
    pub groups: Vec<GapGroup>,
}

/// Read-side service computing rating-gap analytics.
pub struct GapAnalysisService {
    evaluations: Arc<dyn EvaluationStore>,
    ratings: Arc<dyn RatingStore>,
    assignments: Arc<dyn AssignmentDirectory>,
    orgs: Arc<dyn OrgDirectory>,
}

impl GapAnalysisService {
    pub fn new(
        evaluations: Arc<dyn EvaluationStore>,
        ratings: Arc<dyn RatingStore>,
        assignments: Arc<dyn AssignmentDirectory>,
        orgs: Arc<dyn OrgDirectory>,
    ) -> Self {
        Self {
            evaluations,
            ratings,
            assignments,
            orgs,
        }
    }

    pub async fn compute_gap_analysis(
        &self,
        caller: &CallerContext,
        filter: &PopulationFilter,
        granularity: Granularity,
    ) -> WorkflowResult<GapAnalysis> {
        let population = self.visible_population(caller, filter).await?;
        debug!(
            organization = %caller.organization_id,
            instances = population.len(),
            ?granularity,
            "assembled gap-analysis population"
        );

        let employee_ids: Vec<Uuid> = {
            let mut seen = HashSet::new();
            population
                .iter()
                .filter(|i| seen.insert(i.employee_id))
                .map(|i| i.employee_id)
                .collect()
        };

        // Placement resolution is only needed when grouping or filtering
        // by department/job.
        let needs_placement = matches!(granularity, Granularity::Department | Granularity::JobRole)
            || filter.department_id.is_some()
            || filter.job_id.is_some();
        let placements = if needs_placement {
            self.orgs
                .placements(caller.organization_id, &employee_ids)
                .await?
        } else {
            HashMap::new()
        };

        let population: Vec<EvaluationInstance> = population
            .into_iter()
            .filter(|instance| {
                placement_matches(filter, placements.get(&instance.employee_id))
            })
            .collect();

        let groups = match filter.kind {
            EvaluationKind::Competency => {
                self.competency_groups(caller, &population, &placements, granularity)
                    .await?
            }
            EvaluationKind::Appraisal => {
                self.appraisal_groups(caller, &population, &placements, granularity)
                    .await?
            }
        };

        Ok(GapAnalysis {
            granularity,
            groups,
        })
    }

    /// The settled instances the caller is allowed to aggregate over.
    async fn visible_population(
        &self,
        caller: &CallerContext,
        filter: &PopulationFilter,
    ) -> WorkflowResult<Vec<EvaluationInstance>> {
        let mut store_filter = EvaluationFilter::for_org(caller.organization_id);
        store_filter.kind = Some(filter.kind);
        store_filter.cycle_id = filter.cycle_id;
        store_filter.employee_id = filter.employee_id;
        store_filter.settled_only = true;

        let instances = self.evaluations.list(&store_filter).await?;

        let assigned: HashSet<Uuid> = if caller.role == Role::Assessor {
            self.assignments
                .employees_for_assessor(caller.organization_id, caller.user_id)
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        Ok(instances
            .into_iter()
            .filter(|instance| {
                access::can_see(caller, instance, assigned.contains(&instance.employee_id))
            })
            .collect())
    }

    async fn competency_groups(
        &self,
        caller: &CallerContext,
        population: &[EvaluationInstance],
        placements: &HashMap<Uuid, JobPlacement>,
        granularity: Granularity,
    ) -> WorkflowResult<Vec<GapGroup>> {
        let ids: Vec<Uuid> = population.iter().map(|i| i.evaluation_id).collect();
        let by_id: HashMap<Uuid, &EvaluationInstance> =
            population.iter().map(|i| (i.evaluation_id, i)).collect();
        let ratings = self.ratings.ratings_for_many(&ids).await?;

        let mut builder = GroupBuilder::new();
        if granularity == Granularity::Instance {
            // Instances without ratings still get an (empty) group.
            for instance in population {
                builder.touch(GapScope::Instance(instance.evaluation_id));
            }
        }
        for entry in &ratings {
            let Some(instance) = by_id.get(&entry.evaluation_id) else {
                continue;
            };
            let side = if instance.is_self() {
                RatingSide::Employee
            } else {
                RatingSide::Assessor
            };
            let sample = RatingSample::new(entry.competency_id, side, entry.rating);
            if let Some(scope) =
                scope_for(caller, instance, placements, granularity)
            {
                builder.push(scope, sample);
            }
        }
        Ok(builder.finish())
    }

    async fn appraisal_groups(
        &self,
        caller: &CallerContext,
        population: &[EvaluationInstance],
        placements: &HashMap<Uuid, JobPlacement>,
        granularity: Granularity,
    ) -> WorkflowResult<Vec<GapGroup>> {
        // One shared response sheet per (employee, cycle); figure out which
        // sides the population makes countable.
        let mut sheets: Vec<(Uuid, Uuid)> = Vec::new();
        let mut has_side: HashMap<(Uuid, Uuid), (bool, bool)> = HashMap::new();
        for instance in population {
            let key = (instance.employee_id, instance.cycle_id);
            if !has_side.contains_key(&key) {
                sheets.push(key);
            }
            let entry = has_side.entry(key).or_insert((false, false));
            if instance.is_self() {
                entry.0 = true;
            } else {
                entry.1 = true;
            }
        }

        let mut responses: HashMap<(Uuid, Uuid), Vec<QuestionResponse>> = HashMap::new();
        for (employee_id, cycle_id) in &sheets {
            let rows = self
                .ratings
                .responses_for_employee(caller.organization_id, *employee_id, *cycle_id)
                .await?;
            responses.insert((*employee_id, *cycle_id), rows);
        }

        let mut builder = GroupBuilder::new();
        match granularity {
            Granularity::Instance => {
                // Each instance gets its own group carrying its side of the
                // shared sheet.
                for instance in population {
                    let key = (instance.employee_id, instance.cycle_id);
                    let Some(rows) = responses.get(&key) else {
                        continue;
                    };
                    let scope = GapScope::Instance(instance.evaluation_id);
                    builder.touch(scope);
                    for row in rows {
                        if instance.is_self() {
                            if let Some(rating) = row.employee_rating {
                                builder.push(
                                    scope,
                                    RatingSample::new(
                                        row.question_id,
                                        RatingSide::Employee,
                                        rating,
                                    ),
                                );
                            }
                        } else if let Some(rating) = row.assessor_rating {
                            builder.push(
                                scope,
                                RatingSample::new(row.question_id, RatingSide::Assessor, rating),
                            );
                        }
                    }
                }
            }
            _ => {
                for (key, rows) in sheets.iter().map(|k| (*k, &responses[k])) {
                    let (employee_id, _) = key;
                    let (count_self, count_assessor) = has_side[&key];
                    let Some(scope) = employee_scope(
                        caller,
                        employee_id,
                        placements,
                        granularity,
                    ) else {
                        continue;
                    };
                    for row in rows {
                        if count_self {
                            if let Some(rating) = row.employee_rating {
                                builder.push(
                                    scope,
                                    RatingSample::new(
                                        row.question_id,
                                        RatingSide::Employee,
                                        rating,
                                    ),
                                );
                            }
                        }
                        if count_assessor {
                            if let Some(rating) = row.assessor_rating {
                                builder.push(
                                    scope,
                                    RatingSample::new(
                                        row.question_id,
                                        RatingSide::Assessor,
                                        rating,
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(builder.finish())
    }
}

fn placement_matches(filter: &PopulationFilter, placement: Option<&JobPlacement>) -> bool {
    if filter.department_id.is_none() && filter.job_id.is_none() {
        return true;
    }
    let Some(placement) = placement else {
        return false;
    };
    if let Some(department_id) = filter.department_id {
        if placement.department_id != department_id {
            return false;
        }
    }
    if let Some(job_id) = filter.job_id {
        if placement.job_id != job_id {
            return false;
        }
    }
    true
}

fn scope_for(
    caller: &CallerContext,
    instance: &EvaluationInstance,
    placements: &HashMap<Uuid, JobPlacement>,
    granularity: Granularity,
) -> Option<GapScope> {
    match granularity {
        Granularity::Instance => Some(GapScope::Instance(instance.evaluation_id)),
        _ => employee_scope(caller, instance.employee_id, placements, granularity),
    }
}

fn employee_scope(
    caller: &CallerContext,
    employee_id: Uuid,
    placements: &HashMap<Uuid, JobPlacement>,
    granularity: Granularity,
) -> Option<GapScope> {
    match granularity {
        Granularity::Organization => Some(GapScope::Organization(caller.organization_id)),
        Granularity::Department => placements
            .get(&employee_id)
            .map(|p| GapScope::Department(p.department_id)),
        Granularity::JobRole => placements
            .get(&employee_id)
            .map(|p| GapScope::JobRole(p.job_id)),
        Granularity::Instance => None,
    }
}

/// Accumulates samples per scope, preserving first-seen group order.
struct GroupBuilder {
    order: Vec<GapScope>,
    samples: HashMap<GapScope, Vec<RatingSample>>,
}

impl GroupBuilder {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            samples: HashMap::new(),
        }
    }

    /// Register a group even if no samples arrive for it, so instances
    /// without ratings still show up with an empty row set.
    fn touch(&mut self, scope: GapScope) {
        if !self.samples.contains_key(&scope) {
            self.order.push(scope);
            self.samples.insert(scope, Vec::new());
        }
    }

    fn push(&mut self, scope: GapScope, sample: RatingSample) {
        self.touch(scope);
        self.samples.get_mut(&scope).expect("touched above").push(sample);
    }

    fn finish(self) -> Vec<GapGroup> {
        let mut samples = self.samples;
        self.order
            .into_iter()
            .map(|scope| {
                let group_samples = samples.remove(&scope).unwrap_or_default();
                GapGroup {
                    scope,
                    rows: reduce_gaps(group_samples),
                }
            })
            .collect()
    }
}
