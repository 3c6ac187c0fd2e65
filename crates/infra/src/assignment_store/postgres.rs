use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{AggregateId, AggregateRoot, EmployeeId, ExpectedVersion};
use stockledger_inventory::{AssignmentId, AssignmentStatus, ProductId, StockAssignment};

use super::{AssignmentFilter, AssignmentStore};
use crate::error::{StoreError, map_sqlx_error};

/// Postgres-backed assignment rows (`stock_assignments` table).
///
/// `issue_sequence` is a `BIGSERIAL`; `save` is a compare-and-set on `version`.
#[derive(Debug, Clone)]
pub struct PostgresAssignmentStore {
    pool: Arc<PgPool>,
}

impl PostgresAssignmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_ASSIGNMENT: &str = r#"
    SELECT
        assignment_id,
        employee_id,
        product_id,
        quantity,
        remaining_quantity,
        status,
        issue_sequence,
        assigned_at,
        received_at,
        returned_at,
        version
    FROM stock_assignments
"#;

#[async_trait]
impl AssignmentStore for PostgresAssignmentStore {
    #[instrument(skip(self, assignment), fields(assignment_id = %assignment.id_typed()), err)]
    async fn insert(&self, mut assignment: StockAssignment) -> Result<StockAssignment, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_assignments (
                assignment_id,
                employee_id,
                product_id,
                quantity,
                remaining_quantity,
                status,
                assigned_at,
                received_at,
                returned_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING issue_sequence
            "#,
        )
        .bind(assignment.id_typed().0.as_uuid())
        .bind(assignment.employee_id().as_uuid())
        .bind(assignment.product_id().0.as_uuid())
        .bind(assignment.quantity() as i64)
        .bind(assignment.remaining_quantity() as i64)
        .bind(assignment.status().as_str())
        .bind(assignment.assigned_at())
        .bind(assignment.received_at())
        .bind(assignment.returned_at())
        .bind(assignment.version() as i64)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_assignment", e) {
            StoreError::Concurrency(_) => {
                StoreError::Duplicate(format!("assignment {}", assignment.id_typed()))
            }
            other => other,
        })?;

        let sequence: i64 = row
            .try_get("issue_sequence")
            .map_err(|e| map_sqlx_error("insert_assignment", e))?;
        assignment.set_issue_sequence(sequence as u64);
        Ok(assignment)
    }

    #[instrument(skip(self), fields(assignment_id = %id), err)]
    async fn get(&self, id: AssignmentId) -> Result<Option<StockAssignment>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_ASSIGNMENT} WHERE assignment_id = $1"))
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_assignment", e))?;

        row.as_ref().map(decode_assignment).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: AssignmentFilter) -> Result<Vec<StockAssignment>, StoreError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ASSIGNMENT}
            WHERE ($1::uuid IS NULL OR employee_id = $1)
                AND ($2::uuid IS NULL OR product_id = $2)
                AND ($3::text IS NULL OR status = $3)
            ORDER BY issue_sequence ASC"
        ))
        .bind(filter.employee_id.map(|id| *id.as_uuid()))
        .bind(filter.product_id.map(|id| *id.0.as_uuid()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_assignments", e))?;

        rows.iter().map(decode_assignment).collect()
    }

    #[instrument(
        skip(self, assignment),
        fields(assignment_id = %assignment.id_typed(), expected_version = ?expected_version),
        err
    )]
    async fn save(
        &self,
        assignment: &StockAssignment,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let expected: Option<i64> = match expected_version {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        let result = sqlx::query(
            r#"
            UPDATE stock_assignments
            SET remaining_quantity = $2,
                status = $3,
                received_at = $4,
                returned_at = $5,
                version = $6
            WHERE assignment_id = $1
                AND ($7::bigint IS NULL OR version = $7)
            "#,
        )
        .bind(assignment.id_typed().0.as_uuid())
        .bind(assignment.remaining_quantity() as i64)
        .bind(assignment.status().as_str())
        .bind(assignment.received_at())
        .bind(assignment.returned_at())
        .bind(assignment.version() as i64)
        .bind(expected)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_assignment", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish a missing row from a lost race.
        match self.get(assignment.id_typed()).await? {
            None => Err(StoreError::NotFound(format!(
                "assignment {}",
                assignment.id_typed()
            ))),
            Some(current) => Err(StoreError::Concurrency(format!(
                "assignment {}: expected {expected_version:?}, found {}",
                assignment.id_typed(),
                current.version()
            ))),
        }
    }
}

fn decode_assignment(row: &sqlx::postgres::PgRow) -> Result<StockAssignment, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_assignment", e);

    let assignment_id: Uuid = row.try_get("assignment_id").map_err(get)?;
    let employee_id: Uuid = row.try_get("employee_id").map_err(get)?;
    let product_id: Uuid = row.try_get("product_id").map_err(get)?;
    let quantity: i64 = row.try_get("quantity").map_err(get)?;
    let remaining: i64 = row.try_get("remaining_quantity").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let issue_sequence: i64 = row.try_get("issue_sequence").map_err(get)?;
    let assigned_at: Option<DateTime<Utc>> = row.try_get("assigned_at").map_err(get)?;
    let received_at: Option<DateTime<Utc>> = row.try_get("received_at").map_err(get)?;
    let returned_at: Option<DateTime<Utc>> = row.try_get("returned_at").map_err(get)?;
    let version: i64 = row.try_get("version").map_err(get)?;

    let status: AssignmentStatus = status
        .parse()
        .map_err(|e| StoreError::Serialization(format!("stock_assignments.status: {e}")))?;

    Ok(StockAssignment::restore(
        AssignmentId::new(AggregateId::from_uuid(assignment_id)),
        EmployeeId::from_uuid(employee_id),
        ProductId::new(AggregateId::from_uuid(product_id)),
        quantity as u64,
        remaining as u64,
        status,
        issue_sequence as u64,
        assigned_at,
        received_at,
        returned_at,
        version as u64,
    ))
}
