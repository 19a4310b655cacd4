//! # Domain Types
//!
//! Core ledger types: the chart of accounts, journal entries, and the
//! general ledger audit trail.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Types                                │
//! │                                                                     │
//! │  ┌────────────────┐   ┌────────────────┐   ┌────────────────────┐  │
//! │  │    Account     │   │  JournalEntry  │   │ GeneralLedgerEntry │  │
//! │  │  ────────────  │   │  ────────────  │   │  ────────────────  │  │
//! │  │  id (UUID)     │   │  id (UUID)     │   │  seq (monotonic)   │  │
//! │  │  code (human)  │◄──│  account_id    │──►│  journal_entry_id  │  │
//! │  │  account_type  │   │  entry_number  │   │  balance_after     │  │
//! │  │  balance_minor │   │  is_posted     │   │  (append-only)     │  │
//! │  └────────────────┘   └────────────────┘   └────────────────────┘  │
//! │                                                                     │
//! │  AccountType × EntryType ──► signed delta (the sign convention)     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (code, entry_number, ...) - human-readable, assigned once
//!
//! ## Sign Convention
//! Asset and expense accounts are debit-normal: a debit increases the
//! balance, a credit decreases it. Liability, equity, and revenue accounts
//! are credit-normal: the mirror image. `AccountType::signed_delta` is the
//! single place this rule lives.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Account Type
// =============================================================================

/// The five fundamental account classes of double-entry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// All account types, in customary chart-of-accounts order.
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    /// Whether this account class carries a debit-normal balance.
    ///
    /// Asset and expense balances grow on the debit side; liability,
    /// equity, and revenue balances grow on the credit side.
    #[inline]
    pub const fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Computes the signed balance delta a posted entry applies.
    ///
    /// ## The Sign Convention
    /// ```text
    /// ┌───────────────────┬─────────┬─────────┐
    /// │ account class     │  debit  │ credit  │
    /// ├───────────────────┼─────────┼─────────┤
    /// │ asset, expense    │ +amount │ -amount │
    /// │ liability, equity │ -amount │ +amount │
    /// │ revenue           │ -amount │ +amount │
    /// └───────────────────┴─────────┴─────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use folio_core::money::Money;
    /// use folio_core::types::{AccountType, EntryType};
    ///
    /// let delta = AccountType::Asset.signed_delta(EntryType::Debit, Money::from_minor(500_000));
    /// assert_eq!(delta.minor(), 500_000);
    ///
    /// let delta = AccountType::Revenue.signed_delta(EntryType::Debit, Money::from_minor(500_000));
    /// assert_eq!(delta.minor(), -500_000);
    /// ```
    pub fn signed_delta(&self, entry_type: EntryType, amount: Money) -> Money {
        match (self.is_debit_normal(), entry_type) {
            (true, EntryType::Debit) | (false, EntryType::Credit) => amount,
            (true, EntryType::Credit) | (false, EntryType::Debit) => -amount,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Entry Type
// =============================================================================

/// Direction of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    /// The opposite direction, used when building the paired leg.
    #[inline]
    pub const fn opposite(&self) -> EntryType {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Debit => write!(f, "debit"),
            EntryType::Credit => write!(f, "credit"),
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// Lifecycle state of a chart-of-accounts node.
///
/// Deactivation is an explicit state, not a deleted_at timestamp: an
/// account referenced by posted entries is never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

/// A chart-of-accounts node.
///
/// `balance_minor` is a materialized projection of the general ledger,
/// updated only inside the posting transaction. It is never written
/// directly by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Client (tenant) this account belongs to.
    pub client_id: String,

    /// Optional store scope within the client.
    pub store_id: Option<String>,

    /// Human-assigned account code, unique per client (e.g. "1000").
    pub code: String,

    /// Display name (e.g. "Cash").
    pub name: String,

    /// Account class, fixed at creation.
    pub account_type: AccountType,

    /// Parent account forming the tree; None for roots.
    pub parent_id: Option<String>,

    /// Cached balance in minor units. Equals the signed sum of all posted
    /// ledger entries for this account.
    pub balance_minor: i64,

    /// Lifecycle state (soft delete).
    pub status: AccountStatus,

    /// Set by reconciliation when the cached balance disagrees with the
    /// ledger. Cleared manually, never auto-corrected.
    pub needs_reconciliation: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Returns the cached balance as a Money value.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_minor(self.balance_minor)
    }

    /// Whether this account can take new postings.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// A node in the rendered account hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

// =============================================================================
// Journal Entry
// =============================================================================

/// What caused a journal entry: invoices and expenses tag the legs they
/// post so the ledger stays traceable back to its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Invoice,
    Expense,
    Transaction,
}

/// A typed link from a journal entry back to its originating document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReference {
    pub kind: ReferenceKind,
    pub id: String,
}

/// A single-leg journal entry.
///
/// ## State Machine
/// ```text
/// draft ──post──► posted ──unpost──► draft (again)
///                                    │
///   posting_log rows distinguish an unposted entry from one that was
///   never posted; the entry row itself carries only the current state.
/// ```
///
/// Once posted, `amount_minor`, `account_id`, and `entry_type` are
/// immutable; correction goes through `unpost`, never an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JournalEntry {
    pub id: String,
    pub client_id: String,
    pub store_id: Option<String>,

    /// Unique, monotonic business identifier (e.g. "JE-00000042").
    /// Sorts lexicographically in creation order; never reused.
    pub entry_number: String,

    /// Accounting date of the entry (distinct from created_at).
    pub entry_date: NaiveDate,

    pub account_id: String,
    pub entry_type: EntryType,

    /// Always > 0; direction comes from entry_type, never from sign.
    pub amount_minor: i64,

    pub description: String,

    /// Typed reference to the causing document, split across two columns.
    pub reference_kind: Option<ReferenceKind>,
    pub reference_id: Option<String>,

    pub is_posted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Returns the entry amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }

    /// The typed reference, if the entry carries one.
    pub fn reference(&self) -> Option<EntryReference> {
        match (self.reference_kind, self.reference_id.as_ref()) {
            (Some(kind), Some(id)) => Some(EntryReference {
                kind,
                id: id.clone(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Posting Audit Log
// =============================================================================

/// A post or unpost transition recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PostingAction {
    Posted,
    Unposted,
}

/// Append-only record of a post/unpost transition.
///
/// This is what keeps an unposted entry distinguishable from a draft
/// that was never posted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostingLogEntry {
    pub id: String,
    pub journal_entry_id: String,
    pub action: PostingAction,
    pub actor: String,

    /// The signed balance delta this transition applied to the account.
    pub delta_minor: i64,

    pub occurred_at: DateTime<Utc>,
}

// =============================================================================
// General Ledger
// =============================================================================

/// An immutable general-ledger row, created exactly once per successful
/// posting.
///
/// `seq` is a database-assigned monotonic sequence; for a given account,
/// rows ordered by `seq` form the running balance:
/// `balance_after[i] = balance_after[i-1] + signed_delta[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GeneralLedgerEntry {
    pub seq: i64,
    pub client_id: String,
    pub account_id: String,
    pub journal_entry_id: String,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub amount_minor: i64,

    /// Account balance snapshot immediately after this entry.
    pub balance_after_minor: i64,

    pub created_at: DateTime<Utc>,
}

impl GeneralLedgerEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }

    #[inline]
    pub fn balance_after(&self) -> Money {
        Money::from_minor(self.balance_after_minor)
    }
}

/// Debit/credit totals for a client as of a date.
///
/// Under correct operation the two totals are always equal; a nonzero
/// difference signals a posting bug and is surfaced, never papered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub debit_minor: i64,
    pub credit_minor: i64,
}

impl TrialBalance {
    /// The fundamental double-entry invariant.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.debit_minor == self.credit_minor
    }

    /// Signed difference (debits minus credits); zero when balanced.
    #[inline]
    pub fn difference(&self) -> Money {
        Money::from_minor(self.debit_minor - self.credit_minor)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
