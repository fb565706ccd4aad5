//! Postgres-backed evaluation instance store.
//!
//! The fan-out idempotency key lives here: a unique index over
//! (employee_id, assessor_id, kind, cycle_id) with create-or-ignore
//! semantics, so duplicate creates (including two concurrent completion
//! calls racing through fan-out) collapse into one row. Completion and
//! its fan-out inserts run in a single transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{EvaluationInstance, EvaluationKind};
use crate::store::{CreateOutcome, EvaluationFilter, EvaluationStore};

const SELECT_COLUMNS: &str = r#"
    SELECT evaluation_id, organization_id, employee_id, assessor_id,
           evaluation_type, kind, status, cycle_id,
           created_at, started_at, completed_at
    FROM hr_eval.evaluations
"#;

/// Service for evaluation instance persistence
#[derive(Clone, Debug)]
pub struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    /// Create a new evaluation store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_self(
        &self,
        employee_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> Result<Option<EvaluationInstance>> {
        let result = sqlx::query_as::<_, EvaluationInstance>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE employee_id = $1 AND kind = $2 AND cycle_id = $3
              AND evaluation_type = 'SELF'
            "#
        ))
        .bind(employee_id)
        .bind(kind)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find self evaluation")?;

        Ok(result)
    }

    async fn find_assessor_pair(
        &self,
        employee_id: Uuid,
        assessor_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> Result<Option<EvaluationInstance>> {
        let result = sqlx::query_as::<_, EvaluationInstance>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE employee_id = $1 AND assessor_id = $2 AND kind = $3 AND cycle_id = $4
            "#
        ))
        .bind(employee_id)
        .bind(assessor_id)
        .bind(kind)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find assessor evaluation")?;

        Ok(result)
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn fetch(&self, evaluation_id: Uuid) -> Result<Option<EvaluationInstance>> {
        let result = sqlx::query_as::<_, EvaluationInstance>(&format!(
            "{SELECT_COLUMNS} WHERE evaluation_id = $1"
        ))
        .bind(evaluation_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch evaluation by ID")?;

        Ok(result)
    }

    async fn create_self(&self, instance: &EvaluationInstance) -> Result<CreateOutcome> {
        let created = sqlx::query_as::<_, EvaluationInstance>(
            r#"
            INSERT INTO hr_eval.evaluations
                (evaluation_id, organization_id, employee_id, assessor_id,
                 evaluation_type, kind, status, cycle_id, created_at)
            VALUES ($1, $2, $3, NULL, 'SELF', $4, $5, $6, NOW())
            ON CONFLICT (employee_id, kind, cycle_id) WHERE evaluation_type = 'SELF'
            DO NOTHING
            RETURNING evaluation_id, organization_id, employee_id, assessor_id,
                      evaluation_type, kind, status, cycle_id,
                      created_at, started_at, completed_at
            "#,
        )
        .bind(instance.evaluation_id)
        .bind(instance.organization_id)
        .bind(instance.employee_id)
        .bind(instance.kind)
        .bind(instance.status)
        .bind(instance.cycle_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create self evaluation")?;

        match created {
            Some(row) => {
                info!(
                    "Created self evaluation {} for employee {}",
                    row.evaluation_id, row.employee_id
                );
                Ok(CreateOutcome::Created(row))
            }
            None => {
                // Lost the uniqueness race or the instance already existed;
                // either way hand back the surviving row.
                let existing = self
                    .find_self(instance.employee_id, instance.kind, instance.cycle_id)
                    .await?
                    .context("Self evaluation vanished after conflict")?;
                Ok(CreateOutcome::Existing(existing))
            }
        }
    }

    async fn create_assessor(&self, instance: &EvaluationInstance) -> Result<CreateOutcome> {
        let assessor_id = instance
            .assessor_id
            .context("Assessor evaluation without assessor id")?;

        let created = sqlx::query_as::<_, EvaluationInstance>(
            r#"
            INSERT INTO hr_eval.evaluations
                (evaluation_id, organization_id, employee_id, assessor_id,
                 evaluation_type, kind, status, cycle_id, created_at)
            VALUES ($1, $2, $3, $4, 'ASSESSOR', $5, $6, $7, NOW())
            ON CONFLICT (employee_id, assessor_id, kind, cycle_id)
            DO NOTHING
            RETURNING evaluation_id, organization_id, employee_id, assessor_id,
                      evaluation_type, kind, status, cycle_id,
                      created_at, started_at, completed_at
            "#,
        )
        .bind(instance.evaluation_id)
        .bind(instance.organization_id)
        .bind(instance.employee_id)
        .bind(assessor_id)
        .bind(instance.kind)
        .bind(instance.status)
        .bind(instance.cycle_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create assessor evaluation")?;

        match created {
            Some(row) => {
                info!(
                    "Created assessor evaluation {} for employee {} / assessor {}",
                    row.evaluation_id, row.employee_id, assessor_id
                );
                Ok(CreateOutcome::Created(row))
            }
            None => {
                let existing = self
                    .find_assessor_pair(
                        instance.employee_id,
                        assessor_id,
                        instance.kind,
                        instance.cycle_id,
                    )
                    .await?
                    .context("Assessor evaluation vanished after conflict")?;
                Ok(CreateOutcome::Existing(existing))
            }
        }
    }

    async fn save_status(&self, instance: &EvaluationInstance) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE hr_eval.evaluations
            SET status = $1,
                started_at = $2,
                completed_at = $3
            WHERE evaluation_id = $4
            "#,
        )
        .bind(instance.status)
        .bind(instance.started_at)
        .bind(instance.completed_at)
        .bind(instance.evaluation_id)
        .execute(&self.pool)
        .await
        .context("Failed to save evaluation status")?;

        Ok(())
    }

    async fn complete_with_fanout(
        &self,
        instance: &EvaluationInstance,
        fanout: &[EvaluationInstance],
    ) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin completion transaction")?;

        sqlx::query(
            r#"
            UPDATE hr_eval.evaluations
            SET status = $1,
                started_at = $2,
                completed_at = $3
            WHERE evaluation_id = $4
            "#,
        )
        .bind(instance.status)
        .bind(instance.started_at)
        .bind(instance.completed_at)
        .bind(instance.evaluation_id)
        .execute(&mut *tx)
        .await
        .context("Failed to save completed status")?;

        let mut created = 0usize;
        for candidate in fanout {
            let result = sqlx::query(
                r#"
                INSERT INTO hr_eval.evaluations
                    (evaluation_id, organization_id, employee_id, assessor_id,
                     evaluation_type, kind, status, cycle_id, created_at)
                VALUES ($1, $2, $3, $4, 'ASSESSOR', $5, $6, $7, NOW())
                ON CONFLICT (employee_id, assessor_id, kind, cycle_id)
                DO NOTHING
                "#,
            )
            .bind(candidate.evaluation_id)
            .bind(candidate.organization_id)
            .bind(candidate.employee_id)
            .bind(candidate.assessor_id)
            .bind(candidate.kind)
            .bind(candidate.status)
            .bind(candidate.cycle_id)
            .execute(&mut *tx)
            .await
            .context("Failed to create fan-out assessor evaluation")?;

            created += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .context("Failed to commit completion transaction")?;

        info!(
            "Completed evaluation {} with {} fan-out instance(s)",
            instance.evaluation_id, created
        );

        Ok(created)
    }

    async fn list(&self, filter: &EvaluationFilter) -> Result<Vec<EvaluationInstance>> {
        let results = sqlx::query_as::<_, EvaluationInstance>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR employee_id = $2)
              AND ($3::uuid IS NULL OR assessor_id = $3)
              AND ($4::evaluation_kind IS NULL OR kind = $4)
              AND ($5::evaluation_status IS NULL OR status = $5)
              AND ($6::uuid IS NULL OR cycle_id = $6)
              AND (NOT $7 OR status IN ('COMPLETED', 'REVIEWED'))
            ORDER BY created_at ASC
            "#
        ))
        .bind(filter.organization_id)
        .bind(filter.employee_id)
        .bind(filter.assessor_id)
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.cycle_id)
        .bind(filter.settled_only)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list evaluations")?;

        Ok(results)
    }
}
