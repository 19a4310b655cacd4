//! # General Ledger Repository
//!
//! Read-side operations over the append-only ledger: account statements,
//! the trial balance, and cached-balance reconciliation.
//!
//! ## Consistency Checking
//! The ledger is the source of truth; `chart_of_accounts.balance_minor`
//! is a cache. Every read here recomputes what it can and surfaces any
//! disagreement as `DbError::LedgerInconsistency` instead of silently
//! preferring one side:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ledger_for()      recomputes the running balance row by row and    │
//! │                    compares it to each stored balance_after         │
//! │                                                                     │
//! │  verify_account()  recomputes the account balance from the ledger,  │
//! │                    compares it to the cache, and flags the account  │
//! │                    (needs_reconciliation) on mismatch               │
//! │                                                                     │
//! │  Neither ever rewrites a balance. Correction is a human decision.   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{DbError, DbResult};
use folio_core::{Account, GeneralLedgerEntry, Money, TrialBalance};

/// One row of an account statement.
#[derive(Debug, Clone)]
pub struct LedgerLine {
    pub entry: GeneralLedgerEntry,

    /// Running balance recomputed from the ledger itself. Always equal
    /// to `entry.balance_after()` (the fetch fails otherwise).
    pub running: Money,
}

/// Outcome of a cached-balance verification.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub account_id: String,
    pub cached_minor: i64,
    pub derived_minor: i64,
}

impl VerificationReport {
    /// Whether the cache agrees with the ledger.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.cached_minor == self.derived_minor
    }
}

/// Repository for general-ledger reads and reconciliation.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// The statement for one account, optionally restricted by entry
    /// date, in posting order.
    ///
    /// The running balance is recomputed from zero over the account's
    /// full history, independently of the stored snapshots.
    ///
    /// ## Errors
    /// - `LedgerInconsistency` if any stored `balance_after` disagrees
    ///   with the recomputed running balance
    pub async fn ledger_for(
        &self,
        account_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<Vec<LedgerLine>> {
        let account = self.fetch_account(account_id).await?;

        let entries = sqlx::query_as::<_, GeneralLedgerEntry>(
            r#"
            SELECT seq, client_id, account_id, journal_entry_id, entry_date,
                   entry_type, amount_minor, balance_after_minor, created_at
            FROM general_ledger_entries
            WHERE account_id = ?1
            ORDER BY seq
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::new();
        let mut running = Money::zero();

        for entry in entries {
            running += account
                .account_type
                .signed_delta(entry.entry_type, entry.amount());

            if running != entry.balance_after() {
                warn!(
                    account_id = %account_id,
                    seq = entry.seq,
                    stored = entry.balance_after_minor,
                    derived = running.minor(),
                    "Running balance mismatch in general ledger"
                );
                return Err(DbError::LedgerInconsistency {
                    account_id: account_id.to_string(),
                    cached_minor: entry.balance_after_minor,
                    derived_minor: running.minor(),
                });
            }

            let in_range = from.map_or(true, |d| entry.entry_date >= d)
                && to.map_or(true, |d| entry.entry_date <= d);
            if in_range {
                lines.push(LedgerLine { entry, running });
            }
        }

        Ok(lines)
    }

    /// Debit/credit totals across a client's posted entries as of a date.
    ///
    /// Under correct operation `is_balanced()` holds whenever postings
    /// went through `post_transaction`; single-leg posting can leave the
    /// totals apart, which is exactly what this report exists to show.
    pub async fn trial_balance(&self, client_id: &str, as_of: NaiveDate) -> DbResult<TrialBalance> {
        let (debit_minor, credit_minor): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN entry_type = 'debit' THEN amount_minor END), 0),
                COALESCE(SUM(CASE WHEN entry_type = 'credit' THEN amount_minor END), 0)
            FROM general_ledger_entries
            WHERE client_id = ?1 AND entry_date <= ?2
            "#,
        )
        .bind(client_id)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(TrialBalance {
            debit_minor,
            credit_minor,
        })
    }

    /// Recomputes an account's balance from the ledger and compares it
    /// to the cache.
    ///
    /// On mismatch the account is flagged (`needs_reconciliation`) and
    /// the report is still returned; the cached balance is never
    /// rewritten here.
    pub async fn verify_account(&self, account_id: &str) -> DbResult<VerificationReport> {
        let account = self.fetch_account(account_id).await?;

        let derived_minor = self.derive_balance(&account).await?;

        let report = VerificationReport {
            account_id: account_id.to_string(),
            cached_minor: account.balance_minor,
            derived_minor,
        };

        if !report.is_consistent() {
            warn!(
                account_id = %account_id,
                cached = report.cached_minor,
                derived = report.derived_minor,
                "Cached balance disagrees with ledger, flagging for reconciliation"
            );
            sqlx::query(
                "UPDATE chart_of_accounts SET needs_reconciliation = 1, updated_at = ?2 WHERE id = ?1",
            )
            .bind(account_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }

        Ok(report)
    }

    /// Verifies every account of a client, returning the inconsistent
    /// reports. Intended for a periodic integrity sweep.
    pub async fn verify_client(&self, client_id: &str) -> DbResult<Vec<VerificationReport>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM chart_of_accounts WHERE client_id = ?1")
                .bind(client_id)
                .fetch_all(&self.pool)
                .await?;

        let mut findings = Vec::new();
        for id in ids {
            let report = self.verify_account(&id).await?;
            if !report.is_consistent() {
                findings.push(report);
            }
        }
        Ok(findings)
    }

    /// The signed sum of all posted ledger entries for an account.
    async fn derive_balance(&self, account: &Account) -> DbResult<i64> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT entry_type, amount_minor FROM general_ledger_entries WHERE account_id = ?1",
        )
        .bind(&account.id)
        .fetch_all(&self.pool)
        .await?;

        let mut derived = Money::zero();
        for (entry_type, amount_minor) in rows {
            let entry_type = match entry_type.as_str() {
                "debit" => folio_core::EntryType::Debit,
                _ => folio_core::EntryType::Credit,
            };
            derived += account
                .account_type
                .signed_delta(entry_type, Money::from_minor(amount_minor));
        }
        Ok(derived.minor())
    }

    async fn fetch_account(&self, account_id: &str) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, client_id, store_id, code, name, account_type, parent_id,
                   balance_minor, status, needs_reconciliation, created_at, updated_at
            FROM chart_of_accounts
            WHERE id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Account", account_id))
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
    use crate::repository::journal::NewJournalEntry;
    use folio_core::{AccountType, EntryType};

    const CLIENT: &str = "client-1";

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn make_account(db: &Database, code: &str, account_type: AccountType) -> Account {
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

    async fn post(
        db: &Database,
        account_id: &str,
        entry_type: EntryType,
        amount_minor: i64,
        date: NaiveDate,
    ) -> String {
        let entry = db
            .journal()
            .create_entry(NewJournalEntry {
                client_id: CLIENT.to_string(),
                store_id: None,
                entry_date: date,
                account_id: account_id.to_string(),
                entry_type,
                amount_minor,
                description: String::new(),
                reference_kind: None,
                reference_id: None,
            })
            .await
            .unwrap();
        db.journal().post(&entry.id, "tester").await.unwrap();
        entry.id
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_credit_decreases_expense_balance() {
        // Expense account "Rent" credited 100,000 with Cash debited as
        // the paired leg: the expense balance goes negative and the
        // trial balance stays at zero.
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let rent = make_account(&db, "5000", AccountType::Expense).await;

        post(&db, &rent.id, EntryType::Credit, 100_000, d(2026, 1, 10)).await;
        post(&db, &cash.id, EntryType::Debit, 100_000, d(2026, 1, 10)).await;

        assert_eq!(
            db.accounts().get_balance(&rent.id).await.unwrap().minor(),
            -100_000
        );
        assert_eq!(
            db.accounts().get_balance(&cash.id).await.unwrap().minor(),
            100_000
        );

        let tb = db
            .ledger()
            .trial_balance(CLIENT, d(2026, 1, 31))
            .await
            .unwrap();
        assert!(tb.is_balanced());
        assert!(tb.difference().is_zero());
    }

    #[tokio::test]
    async fn test_running_balance_matches_snapshots() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;

        post(&db, &cash.id, EntryType::Debit, 500_000, d(2026, 1, 5)).await;
        post(&db, &cash.id, EntryType::Credit, 200_000, d(2026, 1, 10)).await;
        post(&db, &cash.id, EntryType::Debit, 50_000, d(2026, 1, 15)).await;

        let lines = db.ledger().ledger_for(&cash.id, None, None).await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].running.minor(), 500_000);
        assert_eq!(lines[1].running.minor(), 300_000);
        assert_eq!(lines[2].running.minor(), 350_000);
        for line in &lines {
            assert_eq!(line.running, line.entry.balance_after());
        }
    }

    #[tokio::test]
    async fn test_ledger_date_filter() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;

        post(&db, &cash.id, EntryType::Debit, 100, d(2026, 1, 5)).await;
        post(&db, &cash.id, EntryType::Debit, 200, d(2026, 1, 15)).await;
        post(&db, &cash.id, EntryType::Debit, 300, d(2026, 1, 25)).await;

        let lines = db
            .ledger()
            .ledger_for(&cash.id, Some(d(2026, 1, 10)), Some(d(2026, 1, 20)))
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].entry.amount_minor, 200);
        // Running balance reflects the full history, not just the window
        assert_eq!(lines[0].running.minor(), 300);
    }

    #[tokio::test]
    async fn test_trial_balance_respects_as_of_date() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let sales = make_account(&db, "4000", AccountType::Revenue).await;

        post(&db, &cash.id, EntryType::Debit, 100_000, d(2026, 1, 10)).await;
        post(&db, &sales.id, EntryType::Credit, 100_000, d(2026, 2, 10)).await;

        // As of end of January only the debit leg is in scope
        let tb = db
            .ledger()
            .trial_balance(CLIENT, d(2026, 1, 31))
            .await
            .unwrap();
        assert_eq!(tb.debit_minor, 100_000);
        assert_eq!(tb.credit_minor, 0);
        assert!(!tb.is_balanced());

        // As of end of February both legs are
        let tb = db
            .ledger()
            .trial_balance(CLIENT, d(2026, 2, 28))
            .await
            .unwrap();
        assert!(tb.is_balanced());
    }

    #[tokio::test]
    async fn test_verify_flags_corrupted_cache_without_fixing_it() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        post(&db, &cash.id, EntryType::Debit, 500_000, d(2026, 1, 5)).await;

        // Corrupt the cached balance out-of-band
        sqlx::query("UPDATE chart_of_accounts SET balance_minor = 999 WHERE id = ?1")
            .bind(&cash.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = db.ledger().verify_account(&cash.id).await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.cached_minor, 999);
        assert_eq!(report.derived_minor, 500_000);

        // Flagged, not corrected
        let account = db.accounts().get_by_id(&cash.id).await.unwrap().unwrap();
        assert!(account.needs_reconciliation);
        assert_eq!(account.balance_minor, 999);

        let findings = db.ledger().verify_client(CLIENT).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].account_id, cash.id);
    }

    #[tokio::test]
    async fn test_verify_consistent_account() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        post(&db, &cash.id, EntryType::Debit, 500_000, d(2026, 1, 5)).await;

        let report = db.ledger().verify_account(&cash.id).await.unwrap();
        assert!(report.is_consistent());

        let account = db.accounts().get_by_id(&cash.id).await.unwrap().unwrap();
        assert!(!account.needs_reconciliation);
    }

    #[tokio::test]
    async fn test_statement_detects_corrupted_snapshot() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        post(&db, &cash.id, EntryType::Debit, 500_000, d(2026, 1, 5)).await;

        // Corrupt the stored snapshot out-of-band
        sqlx::query(
            "UPDATE general_ledger_entries SET balance_after_minor = 1 WHERE account_id = ?1",
        )
        .bind(&cash.id)
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .ledger()
            .ledger_for(&cash.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::LedgerInconsistency { .. }));
    }
}
