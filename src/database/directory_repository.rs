//! Postgres reader for the external directories.
//!
//! Users, assessor assignments, and job placements are owned by the
//! surrounding platform's CRUD; this repository only reads the slices the
//! workflow needs: the org's assessor population, assignment links, and
//! current job placements for gap aggregation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::JobPlacement;
use crate::store::{AssignmentDirectory, OrgDirectory, UserDirectory};

/// Read-only directory access for users, assignments, and placements
#[derive(Clone, Debug)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Create a new directory reader
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn assessor_ids_in_org(&self, organization_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id
            FROM hr_eval.org_users
            WHERE organization_id = $1 AND role = 'ASSESSOR'
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list assessors in organization")?;

        Ok(ids)
    }
}

#[async_trait]
impl AssignmentDirectory for PgDirectory {
    async fn assessors_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT assessor_id
            FROM hr_eval.assessor_assignments
            WHERE organization_id = $1 AND employee_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list assessors for employee")?;

        Ok(ids)
    }

    async fn employees_for_assessor(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT employee_id
            FROM hr_eval.assessor_assignments
            WHERE organization_id = $1 AND assessor_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .bind(assessor_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list employees for assessor")?;

        Ok(ids)
    }

    async fn is_assigned(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM hr_eval.assessor_assignments
                WHERE organization_id = $1 AND assessor_id = $2 AND employee_id = $3
            )
            "#,
        )
        .bind(organization_id)
        .bind(assessor_id)
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check assessor assignment")?;

        Ok(exists)
    }
}

#[async_trait]
impl OrgDirectory for PgDirectory {
    async fn placements(
        &self,
        organization_id: Uuid,
        employee_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, JobPlacement>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid)>(
            r#"
            SELECT employee_id, job_id, department_id
            FROM hr_eval.job_positions
            WHERE organization_id = $1 AND employee_id = ANY($2)
            "#,
        )
        .bind(organization_id)
        .bind(employee_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to resolve job placements")?;

        Ok(rows
            .into_iter()
            .map(|(employee_id, job_id, department_id)| {
                (
                    employee_id,
                    JobPlacement {
                        job_id,
                        department_id,
                    },
                )
            })
            .collect())
    }
}
