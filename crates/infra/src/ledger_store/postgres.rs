//! Postgres-backed stock ledger.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | Same sequence number taken |
//! | Database (other) | Any other | `Backend` | Check constraint, connection, etc. |
//! | Decode | N/A | `Serialization` | Row does not match the expected shape |
//!
//! Uses the `stock_events` table from `migrations/0001_stock_ledger.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{AggregateId, EmployeeId, ExpectedVersion};
use stockledger_inventory::{
    AssignmentId, LEDGER_STREAM_TYPE, ProductId, SourceRef, StockEvent, StockEventKind,
    StoredStockEvent,
};
use stockledger_events::Event;

use super::r#trait::{LedgerStore, ensure_single_stream};
use crate::error::{StoreError, map_sqlx_error};

/// Postgres-backed append-only ledger.
///
/// `append()` reads `MAX(sequence_number)` inside a transaction, checks it against the
/// expected version and inserts the batch. If another transaction commits in between,
/// the unique constraint on `(product_id, sequence_number)` fails the insert and the
/// caller sees a concurrency error.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

async fn current_version(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<u64, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(sequence_number), 0) AS current_version
        FROM stock_events
        WHERE product_id = $1
        "#,
    )
    .bind(product_id.0.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("current_version", e))?;

    let version: i64 = row
        .try_get("current_version")
        .map_err(|e| map_sqlx_error("current_version", e))?;
    Ok(version as u64)
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self, events),
        fields(
            product_id = %product_id,
            event_count = events.len(),
            expected_version = ?expected_version
        ),
        err
    )]
    async fn append(
        &self,
        product_id: ProductId,
        events: Vec<StockEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        ensure_single_stream(product_id, &events)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = current_version(&mut tx, product_id).await?;
        if !expected_version.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let mut committed = Vec::with_capacity(events.len());
        let mut next = current + 1;

        for event in events {
            let event_id = Uuid::now_v7();
            let row = sqlx::query(
                r#"
                INSERT INTO stock_events (
                    event_id,
                    product_id,
                    sequence_number,
                    event_type,
                    event_version,
                    kind,
                    quantity,
                    delta,
                    occurred_at,
                    source_operation,
                    source_reference,
                    employee_id,
                    assignment_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING recorded_at
                "#,
            )
            .bind(event_id)
            .bind(product_id.0.as_uuid())
            .bind(next as i64)
            .bind(event.event_type())
            .bind(event.version() as i32)
            .bind(event.kind.as_str())
            .bind(event.quantity as i64)
            .bind(event.delta)
            .bind(event.occurred_at)
            .bind(&event.source.operation)
            .bind(event.source.reference.as_deref())
            .bind(event.employee_id.map(|id| *id.as_uuid()))
            .bind(event.assignment_id.map(|id| *id.0.as_uuid()))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_stock_event", e))?;

            let recorded_at: DateTime<Utc> = row
                .try_get("recorded_at")
                .map_err(|e| map_sqlx_error("insert_stock_event", e))?;

            committed.push(StoredStockEvent::new(
                event_id,
                product_id.0,
                LEDGER_STREAM_TYPE,
                next,
                recorded_at,
                event,
            ));
            next += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn events_for(
        &self,
        product_id: ProductId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                product_id,
                sequence_number,
                kind,
                quantity,
                delta,
                occurred_at,
                recorded_at,
                source_operation,
                source_reference,
                employee_id,
                assignment_id
            FROM stock_events
            WHERE product_id = $1
                AND ($2::timestamptz IS NULL OR occurred_at >= $2)
            ORDER BY occurred_at ASC, sequence_number ASC
            "#,
        )
        .bind(product_id.0.as_uuid())
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("events_for", e))?;

        rows.iter().map(decode_event).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn stream_version(&self, product_id: ProductId) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(MAX(sequence_number), 0) AS current_version
            FROM stock_events
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.0.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stream_version", e))?;

        let version: i64 = row
            .try_get("current_version")
            .map_err(|e| map_sqlx_error("stream_version", e))?;
        Ok(version as u64)
    }
}

fn decode_event(row: &sqlx::postgres::PgRow) -> Result<StoredStockEvent, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_stock_event", e);

    let event_id: Uuid = row.try_get("event_id").map_err(get)?;
    let product_id: Uuid = row.try_get("product_id").map_err(get)?;
    let sequence_number: i64 = row.try_get("sequence_number").map_err(get)?;
    let kind: String = row.try_get("kind").map_err(get)?;
    let quantity: i64 = row.try_get("quantity").map_err(get)?;
    let delta: i64 = row.try_get("delta").map_err(get)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(get)?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at").map_err(get)?;
    let source_operation: String = row.try_get("source_operation").map_err(get)?;
    let source_reference: Option<String> = row.try_get("source_reference").map_err(get)?;
    let employee_id: Option<Uuid> = row.try_get("employee_id").map_err(get)?;
    let assignment_id: Option<Uuid> = row.try_get("assignment_id").map_err(get)?;

    let kind: StockEventKind = kind
        .parse()
        .map_err(|e| StoreError::Serialization(format!("stock_events.kind: {e}")))?;
    let stream_id = AggregateId::from_uuid(product_id);

    let payload = StockEvent {
        product_id: ProductId::new(stream_id),
        kind,
        quantity: quantity as u64,
        delta,
        occurred_at,
        source: SourceRef::new(source_operation, source_reference),
        employee_id: employee_id.map(EmployeeId::from_uuid),
        assignment_id: assignment_id.map(|id| AssignmentId::new(AggregateId::from_uuid(id))),
    };

    Ok(StoredStockEvent::new(
        event_id,
        stream_id,
        LEDGER_STREAM_TYPE,
        sequence_number as u64,
        recorded_at,
        payload,
    ))
}
