//! # Chart of Accounts Repository
//!
//! Database operations for the account tree.
//!
//! ## Account Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Account Lifecycle                               │
//! │                                                                     │
//! │  1. CREATE                                                          │
//! │     └── create() → Account { status: Active, balance: 0 }           │
//! │         ├── duplicate code rejected                                 │
//! │         └── parent must exist, be active, same client,              │
//! │             and keep the tree within MAX_ACCOUNT_DEPTH              │
//! │                                                                     │
//! │  2. POSTINGS (owned by the journal repository)                      │
//! │     └── balance_minor only ever changes inside post()/unpost()      │
//! │                                                                     │
//! │  3. DEACTIVATE                                                      │
//! │     └── deactivate() → status: Inactive (never hard-deleted)        │
//! │         └── rejected while active children exist                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use folio_core::validation::{validate_account_code, validate_name};
use folio_core::{Account, AccountNode, AccountStatus, AccountType, CoreError, Money, MAX_ACCOUNT_DEPTH};

const SELECT_ACCOUNT: &str = r#"
    SELECT id, client_id, store_id, code, name, account_type, parent_id,
           balance_minor, status, needs_reconciliation, created_at, updated_at
    FROM chart_of_accounts
"#;

/// Input for creating a chart-of-accounts node.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub client_id: String,
    pub store_id: Option<String>,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
}

/// Repository for chart-of-accounts operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Creates an account.
    ///
    /// ## Errors
    /// - `DuplicateCode` if the code already exists for the client
    /// - `InvalidParent` if the parent is missing, inactive, belongs to a
    ///   different client, or would exceed the maximum tree depth
    pub async fn create(&self, new: NewAccount) -> DbResult<Account> {
        validate_account_code(&new.code)?;
        validate_name(&new.name)?;

        debug!(client_id = %new.client_id, code = %new.code, "Creating account");

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chart_of_accounts WHERE client_id = ?1 AND code = ?2)",
        )
        .bind(&new.client_id)
        .bind(&new.code)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Err(CoreError::DuplicateCode {
                code: new.code.clone(),
            }
            .into());
        }

        if let Some(parent_id) = &new.parent_id {
            self.check_parent(&new.client_id, parent_id).await?;
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            client_id: new.client_id,
            store_id: new.store_id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            account_type: new.account_type,
            parent_id: new.parent_id,
            balance_minor: 0,
            status: AccountStatus::Active,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO chart_of_accounts (
                id, client_id, store_id, code, name, account_type, parent_id,
                balance_minor, status, needs_reconciliation, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&account.id)
        .bind(&account.client_id)
        .bind(&account.store_id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(&account.parent_id)
        .bind(account.balance_minor)
        .bind(account.status)
        .bind(account.needs_reconciliation)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    /// Validates a prospective parent and its chain depth.
    ///
    /// The walk is bounded by MAX_ACCOUNT_DEPTH, which doubles as the
    /// cycle guard: a corrupted chain can never spin forever.
    async fn check_parent(&self, client_id: &str, parent_id: &str) -> DbResult<()> {
        let invalid = |reason: &str| -> DbError {
            CoreError::InvalidParent {
                parent_id: parent_id.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let parent = self
            .get_by_id(parent_id)
            .await?
            .ok_or_else(|| invalid("does not exist"))?;

        if parent.client_id != client_id {
            return Err(invalid("belongs to a different client"));
        }
        if !parent.is_active() {
            return Err(invalid("is inactive"));
        }

        // Depth of the parent chain; the new account sits one below.
        let mut depth = 1usize;
        let mut cursor = parent.parent_id.clone();
        while let Some(ancestor_id) = cursor {
            depth += 1;
            if depth >= MAX_ACCOUNT_DEPTH {
                return Err(invalid("would exceed maximum account depth"));
            }
            cursor = sqlx::query_scalar(
                "SELECT parent_id FROM chart_of_accounts WHERE id = ?1",
            )
            .bind(&ancestor_id)
            .fetch_optional(&self.pool)
            .await?
            .flatten();
        }

        Ok(())
    }

    /// Gets an account by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    /// Gets an account by its business code within a client.
    pub async fn get_by_code(&self, client_id: &str, code: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "{SELECT_ACCOUNT} WHERE client_id = ?1 AND code = ?2"
        ))
        .bind(client_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Returns the cached balance for an account.
    ///
    /// The cache is maintained transactionally by the posting operation;
    /// this read never recomputes from the ledger.
    pub async fn get_balance(&self, id: &str) -> DbResult<Money> {
        let minor: Option<i64> =
            sqlx::query_scalar("SELECT balance_minor FROM chart_of_accounts WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        minor
            .map(Money::from_minor)
            .ok_or_else(|| DbError::not_found("Account", id))
    }

    /// Deactivates an account (soft delete).
    ///
    /// ## Errors
    /// - `HasChildren` while active children exist
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let account = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))?;

        let has_children: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chart_of_accounts WHERE parent_id = ?1 AND status = 'active')",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if has_children {
            return Err(CoreError::HasChildren {
                account_id: id.to_string(),
            }
            .into());
        }

        debug!(id = %id, code = %account.code, "Deactivating account");

        sqlx::query(
            "UPDATE chart_of_accounts SET status = 'inactive', updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reactivates a previously deactivated account.
    pub async fn reactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE chart_of_accounts SET status = 'active', updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        Ok(())
    }

    /// Lists active accounts of one type for a client, ordered by code.
    pub async fn list_by_type(
        &self,
        client_id: &str,
        account_type: AccountType,
    ) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "{SELECT_ACCOUNT} WHERE client_id = ?1 AND account_type = ?2 AND status = 'active' ORDER BY code"
        ))
        .bind(client_id)
        .bind(account_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Builds the full account hierarchy for a client.
    ///
    /// Returns root nodes grouped by account type (customary chart
    /// order), each nested by parent_id. Finite and restartable: one
    /// query, assembled in memory.
    pub async fn build_hierarchy(&self, client_id: &str) -> DbResult<Vec<AccountNode>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "{SELECT_ACCOUNT} WHERE client_id = ?1 AND status = 'active' ORDER BY account_type, code"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(build_tree(accounts))
    }
}

/// Assembles a flat, ordered account list into a forest.
///
/// Children whose parent is absent from the list (inactive parent) are
/// promoted to roots rather than dropped.
fn build_tree(accounts: Vec<Account>) -> Vec<AccountNode> {
    use std::collections::HashMap;

    let ids: std::collections::HashSet<String> =
        accounts.iter().map(|a| a.id.clone()).collect();

    let mut children_of: HashMap<String, Vec<Account>> = HashMap::new();
    let mut roots: Vec<Account> = Vec::new();

    for account in accounts {
        match account.parent_id.clone() {
            Some(parent_id) if ids.contains(&parent_id) => {
                children_of.entry(parent_id).or_default().push(account);
            }
            _ => roots.push(account),
        }
    }

    fn attach(
        account: Account,
        children_of: &mut std::collections::HashMap<String, Vec<Account>>,
    ) -> AccountNode {
        let children = children_of
            .remove(&account.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children_of))
            .collect();
        AccountNode { account, children }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children_of))
        .collect()
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

    fn new_account(code: &str, account_type: AccountType, parent_id: Option<String>) -> NewAccount {
        NewAccount {
            client_id: CLIENT.to_string(),
            store_id: None,
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type,
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let db = test_db().await;
        let repo = db.accounts();

        let account = repo
            .create(new_account("1000", AccountType::Asset, None))
            .await
            .unwrap();
        assert_eq!(account.balance_minor, 0);
        assert_eq!(account.status, AccountStatus::Active);

        let fetched = repo.get_by_code(CLIENT, "1000").await.unwrap().unwrap();
        assert_eq!(fetched.id, account.id);
        assert_eq!(fetched.account_type, AccountType::Asset);

        assert!(repo.get_balance(&account.id).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        let repo = db.accounts();

        repo.create(new_account("1000", AccountType::Asset, None))
            .await
            .unwrap();

        let err = repo
            .create(new_account("1000", AccountType::Expense, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::DuplicateCode { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_parent_rejected() {
        let db = test_db().await;
        let repo = db.accounts();

        // Missing parent
        let err = repo
            .create(new_account(
                "1100",
                AccountType::Asset,
                Some("no-such-id".to_string()),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidParent { .. })
        ));

        // Parent of another client
        let foreign = repo
            .create(NewAccount {
                client_id: "client-2".to_string(),
                ..new_account("1000", AccountType::Asset, None)
            })
            .await
            .unwrap();
        let err = repo
            .create(new_account("1100", AccountType::Asset, Some(foreign.id)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidParent { .. })
        ));
    }

    #[tokio::test]
    async fn test_depth_bound_enforced() {
        let db = test_db().await;
        let repo = db.accounts();

        let mut parent: Option<String> = None;
        for level in 0..MAX_ACCOUNT_DEPTH {
            let account = repo
                .create(new_account(
                    &format!("10{level}"),
                    AccountType::Asset,
                    parent.clone(),
                ))
                .await
                .unwrap();
            parent = Some(account.id);
        }

        let err = repo
            .create(new_account("1099", AccountType::Asset, parent))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidParent { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_with_children_rejected() {
        let db = test_db().await;
        let repo = db.accounts();

        let parent = repo
            .create(new_account("1000", AccountType::Asset, None))
            .await
            .unwrap();
        repo.create(new_account("1100", AccountType::Asset, Some(parent.id.clone())))
            .await
            .unwrap();

        let err = repo.deactivate(&parent.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::HasChildren { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_and_reactivate() {
        let db = test_db().await;
        let repo = db.accounts();

        let account = repo
            .create(new_account("1000", AccountType::Asset, None))
            .await
            .unwrap();

        repo.deactivate(&account.id).await.unwrap();
        let fetched = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AccountStatus::Inactive);

        repo.reactivate(&account.id).await.unwrap();
        let fetched = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_list_by_type_and_hierarchy() {
        let db = test_db().await;
        let repo = db.accounts();

        let assets = repo
            .create(new_account("1000", AccountType::Asset, None))
            .await
            .unwrap();
        repo.create(new_account("1100", AccountType::Asset, Some(assets.id.clone())))
            .await
            .unwrap();
        repo.create(new_account("4000", AccountType::Revenue, None))
            .await
            .unwrap();

        let listed = repo.list_by_type(CLIENT, AccountType::Asset).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].code, "1000");

        let tree = repo.build_hierarchy(CLIENT).await.unwrap();
        assert_eq!(tree.len(), 2); // "1000" root + "4000" root
        let asset_root = tree.iter().find(|n| n.account.code == "1000").unwrap();
        assert_eq!(asset_root.children.len(), 1);
        assert_eq!(asset_root.children[0].account.code, "1100");
    }
}
