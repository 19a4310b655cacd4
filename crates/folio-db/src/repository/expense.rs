//! # Expense Repository
//!
//! Approval-gated expense documents.
//!
//! ## Approval
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  approve (one transaction)                                          │
//! │                                                                     │
//! │  1. Expense must be pending                                         │
//! │  2. Draft + post the paired legs:                                   │
//! │       debit  expense_account_id   (expense grows)                   │
//! │       credit offset_account_id    (cash/payable shrinks or grows)   │
//! │     both tagged reference_kind = 'expense'                          │
//! │  3. If an allocation covers (client, category, expense_date),       │
//! │     increment its spend and rederive its status                     │
//! │  4. Mark the expense approved (guarded on 'pending')                │
//! │                                                                     │
//! │  A rejected expense never touches the ledger or any budget.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::budget;
use crate::repository::journal::{self, NewJournalEntry};
use folio_core::validation::validate_description;
use folio_core::{CoreError, EntryType, ExpenseRecord, ExpenseStatus, ReferenceKind};

const SELECT_EXPENSE: &str = r#"
    SELECT id, client_id, store_id, expense_account_id, offset_account_id,
           category_id, amount_minor, expense_date, description,
           status, approved_at, approved_by, created_at, updated_at
    FROM expense_records
"#;

/// Input for creating an expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub client_id: String,
    pub store_id: Option<String>,
    pub expense_account_id: String,
    pub offset_account_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub expense_date: NaiveDate,
    pub description: String,
}

/// Repository for expense operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Creates a pending expense.
    ///
    /// Both accounts are checked up front so approval cannot fail on a
    /// reference that was bad from the start.
    pub async fn create(&self, new: NewExpense) -> DbResult<ExpenseRecord> {
        if new.amount_minor <= 0 {
            return Err(CoreError::InvalidAmount {
                amount_minor: new.amount_minor,
            }
            .into());
        }
        validate_description(&new.description)?;

        let mut tx = self.pool.begin().await?;

        for account_id in [&new.expense_account_id, &new.offset_account_id] {
            let account = journal::fetch_account_tx(&mut tx, account_id)
                .await?
                .ok_or_else(|| CoreError::AccountNotFound(account_id.clone()))?;
            if account.client_id != new.client_id {
                return Err(CoreError::CrossClientReference {
                    expected: new.client_id.clone(),
                    found: account.client_id,
                }
                .into());
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO expense_records (
                id, client_id, store_id, expense_account_id, offset_account_id,
                category_id, amount_minor, expense_date, description,
                status, approved_at, approved_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', NULL, NULL, ?10, ?10)
            "#,
        )
        .bind(&id)
        .bind(&new.client_id)
        .bind(&new.store_id)
        .bind(&new.expense_account_id)
        .bind(&new.offset_account_id)
        .bind(&new.category_id)
        .bind(new.amount_minor)
        .bind(new.expense_date)
        .bind(&new.description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.require(&id).await
    }

    /// Approves a pending expense: posts the paired ledger legs and
    /// books the spend against the covering budget, all atomically.
    ///
    /// ## Errors
    /// - `InvalidExpenseStatus` unless the expense is pending
    /// - any posting error, in which case nothing is recorded
    pub async fn approve(&self, expense_id: &str, approver: &str) -> DbResult<ExpenseRecord> {
        let mut tx = self.pool.begin().await?;

        let expense = self.fetch_tx(&mut tx, expense_id).await?;
        if expense.status != ExpenseStatus::Pending {
            return Err(CoreError::InvalidExpenseStatus {
                expense_id: expense_id.to_string(),
                current_status: expense.status.as_str().to_string(),
            }
            .into());
        }

        for (account_id, entry_type) in [
            (&expense.expense_account_id, EntryType::Debit),
            (&expense.offset_account_id, EntryType::Credit),
        ] {
            let entry = journal::create_entry_tx(
                &mut tx,
                NewJournalEntry {
                    client_id: expense.client_id.clone(),
                    store_id: expense.store_id.clone(),
                    entry_date: expense.expense_date,
                    account_id: account_id.clone(),
                    entry_type,
                    amount_minor: expense.amount_minor,
                    description: expense.description.clone(),
                    reference_kind: Some(ReferenceKind::Expense),
                    reference_id: Some(expense.id.clone()),
                },
            )
            .await?;
            journal::post_entry_tx(&mut tx, &entry.id, approver).await?;
        }

        let covering = budget::covering_allocation_tx(
            &mut tx,
            &expense.client_id,
            &expense.category_id,
            expense.expense_date,
        )
        .await?;
        if let Some(allocation) = covering {
            budget::record_spend_tx(
                &mut tx,
                &allocation.id,
                expense.amount_minor,
                expense.expense_date,
            )
            .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE expense_records
            SET status = 'approved', approved_at = ?2, approved_by = ?3, updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(expense_id)
        .bind(Utc::now())
        .bind(approver)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::contention("ExpenseRecord", expense_id));
        }

        tx.commit().await?;

        info!(
            expense_id = %expense_id,
            amount_minor = expense.amount_minor,
            approver = %approver,
            "Approved expense"
        );

        self.require(expense_id).await
    }

    /// Rejects a pending expense. No ledger or budget effect.
    pub async fn reject(&self, expense_id: &str, _actor: &str) -> DbResult<ExpenseRecord> {
        let expense = self.require(expense_id).await?;
        if expense.status != ExpenseStatus::Pending {
            return Err(CoreError::InvalidExpenseStatus {
                expense_id: expense_id.to_string(),
                current_status: expense.status.as_str().to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            r#"
            UPDATE expense_records
            SET status = 'rejected', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(expense_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::contention("ExpenseRecord", expense_id));
        }

        self.require(expense_id).await
    }

    /// Gets an expense by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ExpenseRecord>> {
        let expense = sqlx::query_as::<_, ExpenseRecord>(&format!("{SELECT_EXPENSE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(expense)
    }

    /// Lists a client's expenses in a given status, oldest first.
    pub async fn list_by_status(
        &self,
        client_id: &str,
        status: ExpenseStatus,
    ) -> DbResult<Vec<ExpenseRecord>> {
        let expenses = sqlx::query_as::<_, ExpenseRecord>(&format!(
            "{SELECT_EXPENSE} WHERE client_id = ?1 AND status = ?2 ORDER BY expense_date, id"
        ))
        .bind(client_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    async fn fetch_tx(
        &self,
        conn: &mut sqlx::SqliteConnection,
        id: &str,
    ) -> DbResult<ExpenseRecord> {
        sqlx::query_as::<_, ExpenseRecord>(&format!("{SELECT_EXPENSE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::ExpenseNotFound(id.to_string()).into())
    }

    async fn require(&self, id: &str) -> DbResult<ExpenseRecord> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ExpenseNotFound(id.to_string()).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::account::NewAccount;
    use crate::repository::budget::NewAllocation;
    use folio_core::{AccountType, BudgetStatus};

    const CLIENT: &str = "client-1";

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    async fn make_account(db: &Database, code: &str, account_type: AccountType) -> folio_core::Account {
        db.accounts()
            .create(NewAccount {
                client_id: CLIENT.to_string(),
                store_id: None,
                code: code.to_string(),
                name: format!("Account {code}"),
                account_type,
                parent_id: None,
            })
            .await
            .unwrap()
    }

    async fn setup(db: &Database) -> (String, String) {
        let rent = make_account(db, "5000", AccountType::Expense).await;
        let cash = make_account(db, "1000", AccountType::Asset).await;
        (rent.id, cash.id)
    }

    fn rent_expense(expense_account: &str, offset_account: &str, amount_minor: i64) -> NewExpense {
        NewExpense {
            client_id: CLIENT.to_string(),
            store_id: None,
            expense_account_id: expense_account.to_string(),
            offset_account_id: offset_account.to_string(),
            category_id: "cat-rent".to_string(),
            amount_minor,
            expense_date: d(2026, 1, 15),
            description: "January rent".to_string(),
        }
    }

    #[tokio::test]
    async fn test_approval_posts_balanced_legs() {
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;
        let expenses = db.expenses();

        let expense = expenses
            .create(rent_expense(&rent, &cash, 300_000))
            .await
            .unwrap();
        assert_eq!(expense.status, ExpenseStatus::Pending);

        let expense = expenses.approve(&expense.id, "manager").await.unwrap();
        assert_eq!(expense.status, ExpenseStatus::Approved);
        assert_eq!(expense.approved_by.as_deref(), Some("manager"));
        assert!(expense.approved_at.is_some());

        // Debit expense, credit cash
        assert_eq!(db.accounts().get_balance(&rent).await.unwrap().minor(), 300_000);
        assert_eq!(db.accounts().get_balance(&cash).await.unwrap().minor(), -300_000);

        let tb = db
            .ledger()
            .trial_balance(CLIENT, d(2026, 1, 31))
            .await
            .unwrap();
        assert!(tb.is_balanced());

        // Both legs reference the expense
        let lines = db.ledger().ledger_for(&rent, None, None).await.unwrap();
        let entry = db
            .journal()
            .get_by_id(&lines[0].entry.journal_entry_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.reference().unwrap().kind, ReferenceKind::Expense);
    }

    #[tokio::test]
    async fn test_approval_books_budget_spend() {
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;

        let allocation = db
            .budgets()
            .allocate(NewAllocation {
                client_id: CLIENT.to_string(),
                store_id: None,
                category_id: "cat-rent".to_string(),
                period_start: d(2026, 1, 1),
                period_end: d(2026, 1, 31),
                total_minor: 1_000_000,
            })
            .await
            .unwrap();

        let expense = db
            .expenses()
            .create(rent_expense(&rent, &cash, 600_000))
            .await
            .unwrap();
        db.expenses().approve(&expense.id, "manager").await.unwrap();

        let allocation = db
            .budgets()
            .get_by_id(&allocation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(allocation.spent_minor, 600_000);
        assert_eq!(allocation.status, BudgetStatus::Active);

        // A second expense pushes the budget over
        let expense = db
            .expenses()
            .create(rent_expense(&rent, &cash, 500_000))
            .await
            .unwrap();
        db.expenses().approve(&expense.id, "manager").await.unwrap();

        let allocation = db
            .budgets()
            .get_by_id(&allocation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(allocation.spent_minor, 1_100_000);
        assert_eq!(allocation.status, BudgetStatus::Exceeded);
    }

    #[tokio::test]
    async fn test_approval_without_covering_budget() {
        // No allocation covers the category: the ledger legs still post.
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;

        let expense = db
            .expenses()
            .create(rent_expense(&rent, &cash, 100_000))
            .await
            .unwrap();
        let expense = db.expenses().approve(&expense.id, "manager").await.unwrap();
        assert_eq!(expense.status, ExpenseStatus::Approved);
        assert_eq!(db.accounts().get_balance(&rent).await.unwrap().minor(), 100_000);
    }

    #[tokio::test]
    async fn test_rejection_has_no_ledger_effect() {
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;
        let expenses = db.expenses();

        let expense = expenses
            .create(rent_expense(&rent, &cash, 100_000))
            .await
            .unwrap();
        let expense = expenses.reject(&expense.id, "manager").await.unwrap();
        assert_eq!(expense.status, ExpenseStatus::Rejected);

        assert!(db.accounts().get_balance(&rent).await.unwrap().is_zero());
        assert!(db.accounts().get_balance(&cash).await.unwrap().is_zero());

        // A rejected expense cannot be approved afterwards
        let err = expenses.approve(&expense.id, "manager").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidExpenseStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_approval_rejected() {
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;
        let expenses = db.expenses();

        let expense = expenses
            .create(rent_expense(&rent, &cash, 100_000))
            .await
            .unwrap();
        expenses.approve(&expense.id, "manager").await.unwrap();

        let err = expenses.approve(&expense.id, "manager").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidExpenseStatus { .. })
        ));

        // Exactly one posting happened
        assert_eq!(db.accounts().get_balance(&rent).await.unwrap().minor(), 100_000);
    }

    #[tokio::test]
    async fn test_create_validates_accounts() {
        let db = test_db().await;
        let (rent, _) = setup(&db).await;
        let expenses = db.expenses();

        let err = expenses
            .create(rent_expense(&rent, "missing-account", 100_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::AccountNotFound(_))
        ));

        let err = expenses
            .create(rent_expense(&rent, &rent, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let db = test_db().await;
        let (rent, cash) = setup(&db).await;
        let expenses = db.expenses();

        let a = expenses
            .create(rent_expense(&rent, &cash, 100))
            .await
            .unwrap();
        expenses.create(rent_expense(&rent, &cash, 200)).await.unwrap();
        expenses.approve(&a.id, "manager").await.unwrap();

        let pending = expenses
            .list_by_status(CLIENT, ExpenseStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount_minor, 200);

        let approved = expenses
            .list_by_status(CLIENT, ExpenseStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
    }
}
