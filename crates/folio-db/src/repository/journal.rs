//! # Journal Entry Repository
//!
//! Draft creation, posting, and unposting: the transactional heart of
//! the ledger.
//!
//! ## Posting Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Posting Lifecycle                               │
//! │                                                                     │
//! │  1. CREATE DRAFT                                                    │
//! │     └── create_entry() → JournalEntry { is_posted: false }          │
//! │         └── entry_number allocated from the per-client sequence     │
//! │                                                                     │
//! │  2. POST (one atomic transaction)                                   │
//! │     ├── validate: exists, draft, account active                     │
//! │     ├── delta = AccountType::signed_delta(entry_type, amount)       │
//! │     ├── UPDATE balance  (guarded by the balance value read)         │
//! │     ├── INSERT general_ledger_entries (balance_after snapshot)      │
//! │     ├── UPDATE journal_entries SET is_posted = 1                    │
//! │     └── INSERT journal_posting_log ('posted')                       │
//! │                                                                     │
//! │  3. (OPTIONAL) UNPOST, latest entry per account only                │
//! │     └── reverses every effect of step 2, logs 'unposted'            │
//! │                                                                     │
//! │  ANY failure in step 2 or 3 rolls the whole transaction back:       │
//! │  no balance change and no ledger row is ever visible alone.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Balanced Transactions
//! `post_transaction` posts a set of draft legs atomically and rejects
//! the set unless debits equal credits. Single-leg `post` remains for
//! callers that pair legs themselves; the balanced API is the
//! recommended surface.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use folio_core::validation::validate_description;
use folio_core::{
    Account, CoreError, EntryType, JournalEntry, Money, PostingAction, PostingLogEntry,
    ReferenceKind,
};

const SELECT_ENTRY: &str = r#"
    SELECT id, client_id, store_id, entry_number, entry_date, account_id,
           entry_type, amount_minor, description, reference_kind, reference_id,
           is_posted, posted_at, posted_by, created_at, updated_at
    FROM journal_entries
"#;

const SELECT_ACCOUNT: &str = r#"
    SELECT id, client_id, store_id, code, name, account_type, parent_id,
           balance_minor, status, needs_reconciliation, created_at, updated_at
    FROM chart_of_accounts
"#;

/// Input for drafting a journal entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub client_id: String,
    pub store_id: Option<String>,
    pub entry_date: chrono::NaiveDate,
    pub account_id: String,
    pub entry_type: EntryType,
    pub amount_minor: i64,
    pub description: String,
    pub reference_kind: Option<ReferenceKind>,
    pub reference_id: Option<String>,
}

/// Repository for journal entry operations.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    /// Creates a new JournalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Drafts a journal entry with a freshly allocated entry number.
    ///
    /// ## Errors
    /// - `InvalidAmount` unless amount > 0
    /// - `AccountNotFound` / `CrossClientReference` for bad account refs
    pub async fn create_entry(&self, new: NewJournalEntry) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = create_entry_tx(&mut tx, new).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Posts a draft entry: the core transactional operation.
    ///
    /// All effects (balance update, ledger row, posted flag, audit log)
    /// happen in one transaction; on any failure none of them are
    /// observable.
    ///
    /// ## Errors
    /// - `AlreadyPosted` if the entry is posted
    /// - `InactiveAccount` if the account was deactivated after drafting
    /// - `Contention` if a concurrent writer won the balance guard
    pub async fn post(&self, entry_id: &str, posted_by: &str) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;
        post_entry_tx(&mut tx, entry_id, posted_by).await?;
        tx.commit().await?;

        debug!(entry_id = %entry_id, posted_by = %posted_by, "Posted journal entry");

        self.get_by_id(entry_id)
            .await?
            .ok_or_else(|| DbError::not_found("JournalEntry", entry_id))
    }

    /// Posts a set of draft legs as one balanced transaction.
    ///
    /// ## Errors
    /// - `UnbalancedTransaction` unless total debits equal total credits
    /// - any single-leg posting error, in which case no leg is posted
    pub async fn post_transaction<S: AsRef<str>>(
        &self,
        entry_ids: &[S],
        posted_by: &str,
    ) -> DbResult<Vec<JournalEntry>> {
        let mut tx = self.pool.begin().await?;

        let mut debit_minor = 0i64;
        let mut credit_minor = 0i64;
        for entry_id in entry_ids {
            let entry = fetch_entry_tx(&mut tx, entry_id.as_ref())
                .await?
                .ok_or_else(|| CoreError::EntryNotFound(entry_id.as_ref().to_string()))?;
            match entry.entry_type {
                EntryType::Debit => debit_minor += entry.amount_minor,
                EntryType::Credit => credit_minor += entry.amount_minor,
            }
        }

        if debit_minor != credit_minor {
            return Err(CoreError::UnbalancedTransaction {
                debit_minor,
                credit_minor,
            }
            .into());
        }

        for entry_id in entry_ids {
            post_entry_tx(&mut tx, entry_id.as_ref(), posted_by).await?;
        }

        tx.commit().await?;

        debug!(
            legs = entry_ids.len(),
            total_minor = debit_minor,
            "Posted balanced transaction"
        );

        let mut posted = Vec::with_capacity(entry_ids.len());
        for entry_id in entry_ids {
            posted.push(
                self.get_by_id(entry_id.as_ref())
                    .await?
                    .ok_or_else(|| DbError::not_found("JournalEntry", entry_id.as_ref()))?,
            );
        }
        Ok(posted)
    }

    /// Reverts a posted entry.
    ///
    /// Only the most recently posted entry for an account may be
    /// unposted; anything earlier would invalidate later balance_after
    /// snapshots. The transition is recorded in the posting log, so an
    /// unposted entry stays distinguishable from a never-posted draft.
    ///
    /// ## Errors
    /// - `NotPosted` if the entry is not currently posted
    /// - `NotLatestPosted` if later postings exist for the account
    pub async fn unpost(&self, entry_id: &str, actor: &str) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let entry = fetch_entry_tx(&mut tx, entry_id)
            .await?
            .ok_or_else(|| CoreError::EntryNotFound(entry_id.to_string()))?;

        if !entry.is_posted {
            return Err(CoreError::NotPosted {
                entry_id: entry_id.to_string(),
            }
            .into());
        }

        let ledger_seq: i64 = sqlx::query_scalar(
            "SELECT seq FROM general_ledger_entries WHERE journal_entry_id = ?1",
        )
        .bind(entry_id)
        .fetch_one(&mut *tx)
        .await?;

        let latest_seq: i64 = sqlx::query_scalar(
            "SELECT MAX(seq) FROM general_ledger_entries WHERE account_id = ?1",
        )
        .bind(&entry.account_id)
        .fetch_one(&mut *tx)
        .await?;

        if ledger_seq != latest_seq {
            return Err(CoreError::NotLatestPosted {
                entry_id: entry_id.to_string(),
                account_id: entry.account_id.clone(),
            }
            .into());
        }

        let account = fetch_account_tx(&mut tx, &entry.account_id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(entry.account_id.clone()))?;

        let delta = account
            .account_type
            .signed_delta(entry.entry_type, entry.amount());
        let new_balance = account.balance() - delta;
        let now = Utc::now();

        update_balance_guarded(&mut tx, &account, new_balance, now).await?;

        sqlx::query("DELETE FROM general_ledger_entries WHERE seq = ?1")
            .bind(ledger_seq)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE journal_entries
            SET is_posted = 0, posted_at = NULL, posted_by = NULL, updated_at = ?2
            WHERE id = ?1 AND is_posted = 1
            "#,
        )
        .bind(entry_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::contention("JournalEntry", entry_id));
        }

        log_transition(&mut tx, entry_id, PostingAction::Unposted, actor, -delta).await?;

        tx.commit().await?;

        debug!(entry_id = %entry_id, actor = %actor, "Unposted journal entry");

        self.get_by_id(entry_id)
            .await?
            .ok_or_else(|| DbError::not_found("JournalEntry", entry_id))
    }

    /// Gets a journal entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<JournalEntry>> {
        let entry = sqlx::query_as::<_, JournalEntry>(&format!("{SELECT_ENTRY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Lists a client's draft entries, oldest first.
    pub async fn list_drafts(&self, client_id: &str) -> DbResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(&format!(
            "{SELECT_ENTRY} WHERE client_id = ?1 AND is_posted = 0 ORDER BY entry_number"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// The post/unpost audit history of an entry, oldest first.
    pub async fn posting_history(&self, entry_id: &str) -> DbResult<Vec<PostingLogEntry>> {
        let log = sqlx::query_as::<_, PostingLogEntry>(
            r#"
            SELECT id, journal_entry_id, action, actor, delta_minor, occurred_at
            FROM journal_posting_log
            WHERE journal_entry_id = ?1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(log)
    }
}

// =============================================================================
// Transaction-scoped building blocks
// =============================================================================
// These take a live connection so the invoice and expense repositories can
// compose payment application / budget spend with ledger posting inside a
// single transaction.

/// Drafts an entry within an open transaction.
pub(crate) async fn create_entry_tx(
    conn: &mut SqliteConnection,
    new: NewJournalEntry,
) -> DbResult<JournalEntry> {
    if new.amount_minor <= 0 {
        return Err(CoreError::InvalidAmount {
            amount_minor: new.amount_minor,
        }
        .into());
    }
    validate_description(&new.description)?;

    let account = fetch_account_tx(conn, &new.account_id)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(new.account_id.clone()))?;

    if account.client_id != new.client_id {
        return Err(CoreError::CrossClientReference {
            expected: new.client_id.clone(),
            found: account.client_id,
        }
        .into());
    }

    let entry_number = next_entry_number(conn, &new.client_id).await?;
    let now = Utc::now();

    let entry = JournalEntry {
        id: Uuid::new_v4().to_string(),
        client_id: new.client_id,
        store_id: new.store_id,
        entry_number,
        entry_date: new.entry_date,
        account_id: new.account_id,
        entry_type: new.entry_type,
        amount_minor: new.amount_minor,
        description: new.description,
        reference_kind: new.reference_kind,
        reference_id: new.reference_id,
        is_posted: false,
        posted_at: None,
        posted_by: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO journal_entries (
            id, client_id, store_id, entry_number, entry_date, account_id,
            entry_type, amount_minor, description, reference_kind, reference_id,
            is_posted, posted_at, posted_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.client_id)
    .bind(&entry.store_id)
    .bind(&entry.entry_number)
    .bind(entry.entry_date)
    .bind(&entry.account_id)
    .bind(entry.entry_type)
    .bind(entry.amount_minor)
    .bind(&entry.description)
    .bind(entry.reference_kind)
    .bind(&entry.reference_id)
    .bind(entry.is_posted)
    .bind(entry.posted_at)
    .bind(&entry.posted_by)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Posts one leg within an open transaction. See `JournalRepository::post`.
pub(crate) async fn post_entry_tx(
    conn: &mut SqliteConnection,
    entry_id: &str,
    posted_by: &str,
) -> DbResult<()> {
    let entry = fetch_entry_tx(conn, entry_id)
        .await?
        .ok_or_else(|| CoreError::EntryNotFound(entry_id.to_string()))?;

    if entry.is_posted {
        return Err(CoreError::AlreadyPosted {
            entry_id: entry_id.to_string(),
        }
        .into());
    }

    let account = fetch_account_tx(conn, &entry.account_id)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(entry.account_id.clone()))?;

    if !account.is_active() {
        return Err(CoreError::InactiveAccount {
            account_id: account.id,
        }
        .into());
    }

    // Tenant isolation belt: checked at draft time, enforced again here.
    if account.client_id != entry.client_id {
        return Err(CoreError::CrossClientReference {
            expected: entry.client_id.clone(),
            found: account.client_id,
        }
        .into());
    }

    let delta = account
        .account_type
        .signed_delta(entry.entry_type, entry.amount());
    let new_balance = account.balance() + delta;
    let now = Utc::now();

    update_balance_guarded(conn, &account, new_balance, now).await?;

    sqlx::query(
        r#"
        INSERT INTO general_ledger_entries (
            client_id, account_id, journal_entry_id, entry_date,
            entry_type, amount_minor, balance_after_minor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.client_id)
    .bind(&entry.account_id)
    .bind(&entry.id)
    .bind(entry.entry_date)
    .bind(entry.entry_type)
    .bind(entry.amount_minor)
    .bind(new_balance.minor())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE journal_entries
        SET is_posted = 1, posted_at = ?2, posted_by = ?3, updated_at = ?2
        WHERE id = ?1 AND is_posted = 0
        "#,
    )
    .bind(&entry.id)
    .bind(now)
    .bind(posted_by)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::contention("JournalEntry", entry_id));
    }

    log_transition(conn, entry_id, PostingAction::Posted, posted_by, delta).await?;

    Ok(())
}

/// Allocates the next entry number for a client.
///
/// Zero-padded so entry numbers sort lexicographically in creation
/// order; the sequence row is updated inside the caller's transaction,
/// so numbers are never reused.
async fn next_entry_number(conn: &mut SqliteConnection, client_id: &str) -> DbResult<String> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO journal_sequences (client_id, next_seq) VALUES (?1, 1)
        ON CONFLICT (client_id) DO UPDATE SET next_seq = next_seq + 1
        RETURNING next_seq
        "#,
    )
    .bind(client_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format!("JE-{seq:08}"))
}

/// Applies a balance update guarded by the value that was read.
///
/// Zero affected rows means another writer changed the balance between
/// our read and write; the caller's transaction rolls back and the
/// error is transient.
async fn update_balance_guarded(
    conn: &mut SqliteConnection,
    account: &Account,
    new_balance: Money,
    now: chrono::DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE chart_of_accounts
        SET balance_minor = ?2, updated_at = ?3
        WHERE id = ?1 AND balance_minor = ?4
        "#,
    )
    .bind(&account.id)
    .bind(new_balance.minor())
    .bind(now)
    .bind(account.balance_minor)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::contention("Account", &account.id));
    }

    Ok(())
}

/// Appends a post/unpost transition to the audit log.
async fn log_transition(
    conn: &mut SqliteConnection,
    entry_id: &str,
    action: PostingAction,
    actor: &str,
    delta: Money,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO journal_posting_log (id, journal_entry_id, action, actor, delta_minor, occurred_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(entry_id)
    .bind(action)
    .bind(actor)
    .bind(delta.minor())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_entry_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<JournalEntry>> {
    let entry = sqlx::query_as::<_, JournalEntry>(&format!("{SELECT_ENTRY} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(entry)
}

pub(crate) async fn fetch_account_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNT} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(account)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::account::NewAccount;
    use chrono::NaiveDate;
    use folio_core::AccountType;

    const CLIENT: &str = "client-1";

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
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

    fn entry_for(account_id: &str, entry_type: EntryType, amount_minor: i64) -> NewJournalEntry {
        NewJournalEntry {
            client_id: CLIENT.to_string(),
            store_id: None,
            entry_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            account_id: account_id.to_string(),
            entry_type,
            amount_minor,
            description: "test entry".to_string(),
            reference_kind: None,
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn test_post_debit_to_asset_account() {
        // Scenario: asset account "Cash", debit 500,000.
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;

        let journal = db.journal();
        let entry = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 500_000))
            .await
            .unwrap();
        assert!(!entry.is_posted);

        let posted = journal.post(&entry.id, "tester").await.unwrap();
        assert!(posted.is_posted);
        assert!(posted.posted_at.is_some());
        assert_eq!(posted.posted_by.as_deref(), Some("tester"));

        let balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert_eq!(balance.minor(), 500_000);

        let lines = db.ledger().ledger_for(&cash.id, None, None).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].entry.balance_after_minor, 500_000);
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;

        for amount in [0, -500] {
            let err = db
                .journal()
                .create_entry(entry_for(&cash.id, EntryType::Debit, amount))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DbError::Domain(CoreError::InvalidAmount { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_double_post_rejected() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let entry = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 1000))
            .await
            .unwrap();
        journal.post(&entry.id, "tester").await.unwrap();

        let err = journal.post(&entry.id, "tester").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::AlreadyPosted { .. })
        ));

        // Balance reflects exactly one posting
        let balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert_eq!(balance.minor(), 1000);
    }

    #[tokio::test]
    async fn test_post_to_inactive_account_leaves_no_partial_state() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let entry = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 1000))
            .await
            .unwrap();

        // Account deactivated after the draft was created
        db.accounts().deactivate(&cash.id).await.unwrap();

        let err = journal.post(&entry.id, "tester").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InactiveAccount { .. })
        ));

        // Atomicity: no balance change, no ledger row, entry still draft
        let balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert!(balance.is_zero());
        let rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM general_ledger_entries WHERE account_id = ?1",
        )
        .bind(&cash.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(rows, 0);
        assert!(!journal.get_by_id(&entry.id).await.unwrap().unwrap().is_posted);
    }

    #[tokio::test]
    async fn test_unpost_reverses_posting() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let entry = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 250_000))
            .await
            .unwrap();
        journal.post(&entry.id, "tester").await.unwrap();

        let reverted = journal.unpost(&entry.id, "auditor").await.unwrap();
        assert!(!reverted.is_posted);
        assert!(reverted.posted_at.is_none());

        let balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert!(balance.is_zero());

        // The audit log distinguishes this from a never-posted draft
        let history = journal.posting_history(&entry.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, PostingAction::Posted);
        assert_eq!(history[0].delta_minor, 250_000);
        assert_eq!(history[1].action, PostingAction::Unposted);
        assert_eq!(history[1].delta_minor, -250_000);
    }

    #[tokio::test]
    async fn test_unpost_requires_posted_entry() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let entry = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 1000))
            .await
            .unwrap();

        let err = journal.unpost(&entry.id, "auditor").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotPosted { .. })));
    }

    #[tokio::test]
    async fn test_unpost_non_latest_rejected() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let first = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 1000))
            .await
            .unwrap();
        let second = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 2000))
            .await
            .unwrap();
        journal.post(&first.id, "tester").await.unwrap();
        journal.post(&second.id, "tester").await.unwrap();

        let err = journal.unpost(&first.id, "auditor").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotLatestPosted { .. })
        ));

        // Unposting in reverse order works
        journal.unpost(&second.id, "auditor").await.unwrap();
        journal.unpost(&first.id, "auditor").await.unwrap();
        let balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert!(balance.is_zero());
    }

    #[tokio::test]
    async fn test_post_transaction_balanced_pair() {
        // Scenario: expense "Rent" credited, asset "Cash" debited as the
        // paired leg. Per the sign convention the credit decreases the
        // expense balance and the debit increases the asset balance.
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let rent = make_account(&db, "5000", AccountType::Expense).await;
        let journal = db.journal();

        let credit = journal
            .create_entry(entry_for(&rent.id, EntryType::Credit, 100_000))
            .await
            .unwrap();
        let debit = journal
            .create_entry(entry_for(&cash.id, EntryType::Debit, 100_000))
            .await
            .unwrap();

        journal
            .post_transaction(&[&credit.id, &debit.id], "tester")
            .await
            .unwrap();

        let rent_balance = db.accounts().get_balance(&rent.id).await.unwrap();
        assert_eq!(rent_balance.minor(), -100_000);
        let cash_balance = db.accounts().get_balance(&cash.id).await.unwrap();
        assert_eq!(cash_balance.minor(), 100_000);

        let tb = db
            .ledger()
            .trial_balance(CLIENT, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
            .await
            .unwrap();
        assert!(tb.is_balanced());
    }

    #[tokio::test]
    async fn test_post_transaction_unbalanced_rejected() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let rent = make_account(&db, "5000", AccountType::Expense).await;
        let journal = db.journal();

        let debit = journal
            .create_entry(entry_for(&rent.id, EntryType::Debit, 100_000))
            .await
            .unwrap();
        let credit = journal
            .create_entry(entry_for(&cash.id, EntryType::Credit, 90_000))
            .await
            .unwrap();

        let err = journal
            .post_transaction(&[&debit.id, &credit.id], "tester")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnbalancedTransaction {
                debit_minor: 100_000,
                credit_minor: 90_000,
            })
        ));

        // Nothing was posted
        assert!(db.accounts().get_balance(&cash.id).await.unwrap().is_zero());
        assert!(db.accounts().get_balance(&rent.id).await.unwrap().is_zero());
        assert!(!journal.get_by_id(&debit.id).await.unwrap().unwrap().is_posted);
    }

    #[tokio::test]
    async fn test_entry_numbers_are_monotonic() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;
        let journal = db.journal();

        let mut previous = String::new();
        for _ in 0..3 {
            let entry = journal
                .create_entry(entry_for(&cash.id, EntryType::Debit, 1000))
                .await
                .unwrap();
            assert!(entry.entry_number > previous);
            previous = entry.entry_number;
        }
        assert_eq!(previous, "JE-00000003");
    }

    #[tokio::test]
    async fn test_cross_client_reference_rejected() {
        let db = test_db().await;
        let cash = make_account(&db, "1000", AccountType::Asset).await;

        let mut foreign = entry_for(&cash.id, EntryType::Debit, 1000);
        foreign.client_id = "client-2".to_string();

        let err = db.journal().create_entry(foreign).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CrossClientReference { .. })
        ));
    }
}
