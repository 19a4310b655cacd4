//! # Budget Allocation Repository
//!
//! Budget allocations per category and period, with spend tracking.
//!
//! ## Allocation Uniqueness
//! At most one active allocation may cover a given category at a given
//! date: creation rejects any period overlapping an existing active
//! allocation for the same client and category (inclusive on both ends).
//!
//! ## Spend Tracking
//! `spent_minor` only grows, and every increment rederives the status
//! via `BudgetStatus::derive`. Exceeding the budget never blocks the
//! spend: the expense already happened; the budget records the fact.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use folio_core::validation::{validate_amount_minor, validate_period};
use folio_core::{BudgetAllocation, BudgetStatus, CoreError, Money};

const SELECT_ALLOCATION: &str = r#"
    SELECT id, client_id, store_id, category_id, period_start, period_end,
           total_minor, spent_minor, status, created_at, updated_at
    FROM budget_allocations
"#;

/// Input for creating a budget allocation.
#[derive(Debug, Clone)]
pub struct NewAllocation {
    pub client_id: String,
    pub store_id: Option<String>,
    pub category_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_minor: i64,
}

/// Repository for budget allocations.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    pool: SqlitePool,
}

impl BudgetRepository {
    /// Creates a new BudgetRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BudgetRepository { pool }
    }

    /// Creates a budget allocation.
    ///
    /// ## Errors
    /// - `OverlappingPeriod` if an active allocation for the same client
    ///   and category overlaps the requested window
    pub async fn allocate(&self, new: NewAllocation) -> DbResult<BudgetAllocation> {
        validate_amount_minor(new.total_minor)?;
        validate_period(new.period_start, new.period_end)?;

        let mut tx = self.pool.begin().await?;

        // Inclusive overlap: a_start <= b_end AND b_start <= a_end
        let overlapping: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM budget_allocations
            WHERE client_id = ?1 AND category_id = ?2 AND status = 'active'
              AND period_start <= ?4 AND ?3 <= period_end
            LIMIT 1
            "#,
        )
        .bind(&new.client_id)
        .bind(&new.category_id)
        .bind(new.period_start)
        .bind(new.period_end)
        .fetch_optional(&mut *tx)
        .await?;

        if overlapping.is_some() {
            return Err(CoreError::OverlappingPeriod {
                category_id: new.category_id,
                period_start: new.period_start.to_string(),
                period_end: new.period_end.to_string(),
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO budget_allocations (
                id, client_id, store_id, category_id, period_start, period_end,
                total_minor, spent_minor, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'active', ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.client_id)
        .bind(&new.store_id)
        .bind(&new.category_id)
        .bind(new.period_start)
        .bind(new.period_end)
        .bind(new.total_minor)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            category = %new.category_id,
            total_minor = new.total_minor,
            "Created budget allocation"
        );

        self.require(&id).await
    }

    /// Records spend against an allocation.
    pub async fn record_spend(
        &self,
        allocation_id: &str,
        amount_minor: i64,
        today: NaiveDate,
    ) -> DbResult<BudgetAllocation> {
        let mut tx = self.pool.begin().await?;
        record_spend_tx(&mut tx, allocation_id, amount_minor, today).await?;
        tx.commit().await?;

        self.require(allocation_id).await
    }

    /// The active allocation covering a category on a date, if any.
    pub async fn covering_allocation(
        &self,
        client_id: &str,
        category_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<BudgetAllocation>> {
        let mut conn = self.pool.acquire().await?;
        covering_allocation_tx(&mut conn, client_id, category_id, date).await
    }

    /// Rederives an allocation's status on a date boundary (e.g. a daily
    /// sweep moving ended allocations to `completed`).
    pub async fn refresh_status(
        &self,
        allocation_id: &str,
        today: NaiveDate,
    ) -> DbResult<BudgetAllocation> {
        let allocation = self.require(allocation_id).await?;
        let status = BudgetStatus::derive(
            allocation.spent(),
            allocation.total(),
            allocation.period_end,
            today,
        );

        if status != allocation.status {
            sqlx::query("UPDATE budget_allocations SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(allocation_id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        }

        self.require(allocation_id).await
    }

    /// Gets an allocation by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<BudgetAllocation>> {
        let allocation =
            sqlx::query_as::<_, BudgetAllocation>(&format!("{SELECT_ALLOCATION} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(allocation)
    }

    /// Lists a client's allocations, newest period first.
    pub async fn list(&self, client_id: &str) -> DbResult<Vec<BudgetAllocation>> {
        let allocations = sqlx::query_as::<_, BudgetAllocation>(&format!(
            "{SELECT_ALLOCATION} WHERE client_id = ?1 ORDER BY period_start DESC, category_id"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(allocations)
    }

    async fn require(&self, id: &str) -> DbResult<BudgetAllocation> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::AllocationNotFound(id.to_string()).into())
    }
}

// =============================================================================
// Transaction-scoped building blocks
// =============================================================================

/// Increments an allocation's spend within an open transaction, guarded
/// by the spent value that was read.
pub(crate) async fn record_spend_tx(
    conn: &mut SqliteConnection,
    allocation_id: &str,
    amount_minor: i64,
    today: NaiveDate,
) -> DbResult<()> {
    validate_amount_minor(amount_minor)?;

    let allocation =
        sqlx::query_as::<_, BudgetAllocation>(&format!("{SELECT_ALLOCATION} WHERE id = ?1"))
            .bind(allocation_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::AllocationNotFound(allocation_id.to_string()))?;

    let new_spent = allocation.spent() + Money::from_minor(amount_minor);
    let status = BudgetStatus::derive(new_spent, allocation.total(), allocation.period_end, today);

    if status == BudgetStatus::Exceeded && allocation.status != BudgetStatus::Exceeded {
        warn!(
            allocation_id = %allocation_id,
            spent_minor = new_spent.minor(),
            total_minor = allocation.total_minor,
            "Budget exceeded"
        );
    }

    let result = sqlx::query(
        r#"
        UPDATE budget_allocations
        SET spent_minor = ?2, status = ?3, updated_at = ?4
        WHERE id = ?1 AND spent_minor = ?5
        "#,
    )
    .bind(allocation_id)
    .bind(new_spent.minor())
    .bind(status)
    .bind(Utc::now())
    .bind(allocation.spent_minor)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::contention("BudgetAllocation", allocation_id));
    }

    Ok(())
}

/// Covering-allocation lookup usable inside an open transaction.
pub(crate) async fn covering_allocation_tx(
    conn: &mut SqliteConnection,
    client_id: &str,
    category_id: &str,
    date: NaiveDate,
) -> DbResult<Option<BudgetAllocation>> {
    let allocation = sqlx::query_as::<_, BudgetAllocation>(&format!(
        r#"{SELECT_ALLOCATION}
        WHERE client_id = ?1 AND category_id = ?2 AND status IN ('active', 'exceeded')
          AND period_start <= ?3 AND ?3 <= period_end
        LIMIT 1
        "#
    ))
    .bind(client_id)
    .bind(category_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(allocation)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    const CLIENT: &str = "client-1";

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn january_budget(total_minor: i64) -> NewAllocation {
        NewAllocation {
            client_id: CLIENT.to_string(),
            store_id: None,
            category_id: "cat-marketing".to_string(),
            period_start: d(2026, 1, 1),
            period_end: d(2026, 1, 31),
            total_minor,
        }
    }

    #[tokio::test]
    async fn test_spend_within_then_over_budget() {
        // Scenario: 1,000,000 budget; 600,000 keeps it active; a further
        // 500,000 pushes it to exceeded with spent 1,100,000.
        let db = test_db().await;
        let budgets = db.budgets();
        let allocation = budgets.allocate(january_budget(1_000_000)).await.unwrap();
        assert_eq!(allocation.status, BudgetStatus::Active);

        let allocation = budgets
            .record_spend(&allocation.id, 600_000, d(2026, 1, 10))
            .await
            .unwrap();
        assert_eq!(allocation.spent_minor, 600_000);
        assert_eq!(allocation.status, BudgetStatus::Active);
        assert_eq!(allocation.remaining().minor(), 400_000);

        let allocation = budgets
            .record_spend(&allocation.id, 500_000, d(2026, 1, 20))
            .await
            .unwrap();
        assert_eq!(allocation.spent_minor, 1_100_000);
        assert_eq!(allocation.status, BudgetStatus::Exceeded);
        assert_eq!(allocation.remaining().minor(), -100_000);
    }

    #[tokio::test]
    async fn test_spend_exactly_at_total_is_not_exceeded() {
        let db = test_db().await;
        let budgets = db.budgets();
        let allocation = budgets.allocate(january_budget(1_000_000)).await.unwrap();

        let allocation = budgets
            .record_spend(&allocation.id, 1_000_000, d(2026, 1, 10))
            .await
            .unwrap();
        assert_eq!(allocation.status, BudgetStatus::Active);
    }

    #[tokio::test]
    async fn test_overlapping_allocation_rejected() {
        let db = test_db().await;
        let budgets = db.budgets();
        budgets.allocate(january_budget(1_000_000)).await.unwrap();

        // Overlaps mid-January
        let err = budgets
            .allocate(NewAllocation {
                period_start: d(2026, 1, 20),
                period_end: d(2026, 2, 20),
                ..january_budget(500_000)
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OverlappingPeriod { .. })
        ));

        // Same window, different category: fine
        budgets
            .allocate(NewAllocation {
                category_id: "cat-travel".to_string(),
                ..january_budget(500_000)
            })
            .await
            .unwrap();

        // Adjacent, non-overlapping window: fine
        budgets
            .allocate(NewAllocation {
                period_start: d(2026, 2, 1),
                period_end: d(2026, 2, 28),
                ..january_budget(500_000)
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_covering_allocation_lookup() {
        let db = test_db().await;
        let budgets = db.budgets();
        let allocation = budgets.allocate(january_budget(1_000_000)).await.unwrap();

        let found = budgets
            .covering_allocation(CLIENT, "cat-marketing", d(2026, 1, 15))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, allocation.id);

        // Outside the window
        assert!(budgets
            .covering_allocation(CLIENT, "cat-marketing", d(2026, 2, 1))
            .await
            .unwrap()
            .is_none());
        // Different client
        assert!(budgets
            .covering_allocation("client-2", "cat-marketing", d(2026, 1, 15))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_refresh_status_completes_ended_period() {
        let db = test_db().await;
        let budgets = db.budgets();
        let allocation = budgets.allocate(january_budget(1_000_000)).await.unwrap();

        let allocation = budgets
            .refresh_status(&allocation.id, d(2026, 2, 5))
            .await
            .unwrap();
        assert_eq!(allocation.status, BudgetStatus::Completed);
    }

    #[tokio::test]
    async fn test_exceeded_survives_period_end() {
        let db = test_db().await;
        let budgets = db.budgets();
        let allocation = budgets.allocate(january_budget(100)).await.unwrap();
        budgets
            .record_spend(&allocation.id, 200, d(2026, 1, 10))
            .await
            .unwrap();

        let allocation = budgets
            .refresh_status(&allocation.id, d(2026, 2, 5))
            .await
            .unwrap();
        assert_eq!(allocation.status, BudgetStatus::Exceeded);
    }

    #[tokio::test]
    async fn test_invalid_allocation_inputs() {
        let db = test_db().await;
        let budgets = db.budgets();

        let err = budgets.allocate(january_budget(0)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let err = budgets
            .allocate(NewAllocation {
                period_start: d(2026, 1, 31),
                period_end: d(2026, 1, 1),
                ..january_budget(1000)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }
}
