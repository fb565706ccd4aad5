//! Postgres-backed rating and response store.
//!
//! Competency ratings upsert against (evaluation_id, competency_id) so a
//! re-submission before completion corrects in place. Appraisal responses
//! upsert against the shared (employee_id, cycle_id, question_id) row and
//! each write touches only its own side's columns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{QuestionResponse, RatingEntry, RatingSide};
use crate::store::{RatingStore, ResponseKey};

const RESPONSE_COLUMNS: &str = r#"
    response_id, organization_id, employee_id, cycle_id, question_id,
    employee_rating, employee_comment, assessor_rating, assessor_comment,
    created_at, updated_at
"#;

/// Service for rating and response persistence
#[derive(Clone, Debug)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    /// Create a new rating store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RatingStore for PgRatingStore {
    async fn upsert_rating(&self, entry: &RatingEntry) -> Result<RatingEntry> {
        let result = sqlx::query_as::<_, RatingEntry>(
            r#"
            INSERT INTO hr_eval.competency_ratings
                (rating_id, evaluation_id, competency_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (evaluation_id, competency_id)
            DO UPDATE SET rating = EXCLUDED.rating,
                          comment = EXCLUDED.comment
            RETURNING rating_id, evaluation_id, competency_id, rating, comment, created_at
            "#,
        )
        .bind(entry.rating_id)
        .bind(entry.evaluation_id)
        .bind(entry.competency_id)
        .bind(entry.rating)
        .bind(&entry.comment)
        .fetch_one(&self.pool)
        .await
        .context("Failed to record competency rating")?;

        info!(
            "Recorded rating {} for competency {} on evaluation {}",
            result.rating, result.competency_id, result.evaluation_id
        );

        Ok(result)
    }

    async fn ratings_for(&self, evaluation_id: Uuid) -> Result<Vec<RatingEntry>> {
        let results = sqlx::query_as::<_, RatingEntry>(
            r#"
            SELECT rating_id, evaluation_id, competency_id, rating, comment, created_at
            FROM hr_eval.competency_ratings
            WHERE evaluation_id = $1
            ORDER BY competency_id ASC, created_at ASC
            "#,
        )
        .bind(evaluation_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ratings for evaluation")?;

        Ok(results)
    }

    async fn ratings_for_many(&self, evaluation_ids: &[Uuid]) -> Result<Vec<RatingEntry>> {
        let results = sqlx::query_as::<_, RatingEntry>(
            r#"
            SELECT rating_id, evaluation_id, competency_id, rating, comment, created_at
            FROM hr_eval.competency_ratings
            WHERE evaluation_id = ANY($1)
            ORDER BY competency_id ASC, created_at ASC
            "#,
        )
        .bind(evaluation_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ratings for evaluations")?;

        Ok(results)
    }

    async fn upsert_response(
        &self,
        key: &ResponseKey,
        side: RatingSide,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<QuestionResponse> {
        // The conflict action only touches the writing side's columns; the
        // other side survives untouched.
        let sql = match side {
            RatingSide::Employee => format!(
                r#"
                INSERT INTO hr_eval.question_responses
                    (response_id, organization_id, employee_id, cycle_id, question_id,
                     employee_rating, employee_comment, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
                ON CONFLICT (employee_id, cycle_id, question_id)
                DO UPDATE SET employee_rating = EXCLUDED.employee_rating,
                              employee_comment = EXCLUDED.employee_comment,
                              updated_at = NOW()
                RETURNING {RESPONSE_COLUMNS}
                "#
            ),
            RatingSide::Assessor => format!(
                r#"
                INSERT INTO hr_eval.question_responses
                    (response_id, organization_id, employee_id, cycle_id, question_id,
                     assessor_rating, assessor_comment, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
                ON CONFLICT (employee_id, cycle_id, question_id)
                DO UPDATE SET assessor_rating = EXCLUDED.assessor_rating,
                              assessor_comment = EXCLUDED.assessor_comment,
                              updated_at = NOW()
                RETURNING {RESPONSE_COLUMNS}
                "#
            ),
        };

        let result = sqlx::query_as::<_, QuestionResponse>(&sql)
            .bind(Uuid::new_v4())
            .bind(key.organization_id)
            .bind(key.employee_id)
            .bind(key.cycle_id)
            .bind(key.question_id)
            .bind(rating)
            .bind(comment)
            .fetch_one(&self.pool)
            .await
            .context("Failed to record question response")?;

        info!(
            "Recorded {:?}-side response for question {} / employee {}",
            side, key.question_id, key.employee_id
        );

        Ok(result)
    }

    async fn responses_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<QuestionResponse>> {
        let results = sqlx::query_as::<_, QuestionResponse>(&format!(
            r#"
            SELECT {RESPONSE_COLUMNS}
            FROM hr_eval.question_responses
            WHERE organization_id = $1 AND employee_id = $2 AND cycle_id = $3
            ORDER BY question_id ASC, created_at ASC
            "#
        ))
        .bind(organization_id)
        .bind(employee_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list responses for employee")?;

        Ok(results)
    }
}
