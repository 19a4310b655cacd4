//! # Error Types
//!
//! Domain-specific error types for folio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  folio-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule / state-conflict errors       │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  folio-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures, contention, consistency   │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → host application     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (account code, entry id, amounts)
//! 3. Errors are enum variants, never String
//! 4. No variant here implies partial state: every CoreError is raised
//!    before or instead of a write, never after half of one

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule and state-conflict errors.
///
/// These cover the synchronous, no-state-change error classes of the
/// ledger: invalid input the caller can correct, and operations attempted
/// against an entity in the wrong state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An account with this code already exists for the client.
    #[error("Account code '{code}' already exists")]
    DuplicateCode { code: String },

    /// The requested parent account cannot be used.
    ///
    /// ## When This Occurs
    /// - Parent id does not exist
    /// - Parent belongs to a different client
    /// - Parent is inactive
    /// - Parent chain would exceed the maximum tree depth
    #[error("Invalid parent account {parent_id}: {reason}")]
    InvalidParent { parent_id: String, reason: String },

    /// Account cannot be deactivated while it has active children.
    #[error("Account {account_id} has active child accounts")]
    HasChildren { account_id: String },

    /// Account cannot be found (or is outside the caller's client).
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The referenced account has been deactivated.
    ///
    /// ## When This Occurs
    /// - Posting an entry whose account was deactivated after the entry
    ///   was drafted
    #[error("Account {account_id} is inactive")]
    InactiveAccount { account_id: String },

    /// Journal entry amounts must be strictly positive.
    #[error("Invalid amount: {amount_minor} (must be > 0)")]
    InvalidAmount { amount_minor: i64 },

    /// Journal entry cannot be found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    /// Entry is already posted; posted entries are immutable.
    #[error("Journal entry {entry_id} is already posted")]
    AlreadyPosted { entry_id: String },

    /// Entry is not posted, so it cannot be unposted.
    #[error("Journal entry {entry_id} is not posted")]
    NotPosted { entry_id: String },

    /// Only the most recently posted entry for an account may be unposted.
    ///
    /// Unposting out of order would invalidate every later balance_after
    /// snapshot for the account, so it is forbidden outright.
    #[error("Journal entry {entry_id} is not the latest posted entry for account {account_id}")]
    NotLatestPosted {
        entry_id: String,
        account_id: String,
    },

    /// A paired posting's debit legs do not equal its credit legs.
    #[error("Unbalanced transaction: debits {debit_minor}, credits {credit_minor}")]
    UnbalancedTransaction {
        debit_minor: i64,
        credit_minor: i64,
    },

    /// An operation referenced an entity belonging to another client.
    ///
    /// Tenant isolation is absolute: a journal entry may never point at
    /// another client's account, an expense at another client's budget, etc.
    #[error("Cross-client reference: expected client {expected}, found {found}")]
    CrossClientReference { expected: String, found: String },

    /// Invoice cannot be found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Invoice is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Sending an already-sent invoice
    /// - Cancelling a paid invoice
    /// - Recording a payment against a draft or cancelled invoice
    #[error("Invoice cannot move from '{from}' to '{to}'")]
    InvalidStatusTransition { from: String, to: String },

    /// Payment would exceed the invoice total.
    #[error(
        "Overpayment on invoice {invoice_id}: attempted {attempted_minor}, outstanding {outstanding_minor}"
    )]
    Overpayment {
        invoice_id: String,
        attempted_minor: i64,
        outstanding_minor: i64,
    },

    /// Budget allocation cannot be found.
    #[error("Budget allocation not found: {0}")]
    AllocationNotFound(String),

    /// An active allocation already covers this category and period.
    #[error("Category {category_id} already has an allocation overlapping {period_start}..{period_end}")]
    OverlappingPeriod {
        category_id: String,
        period_start: String,
        period_end: String,
    },

    /// Expense record cannot be found.
    #[error("Expense record not found: {0}")]
    ExpenseNotFound(String),

    /// Expense is not in a state that allows the requested operation.
    #[error("Expense {expense_id} is {current_status}, cannot perform operation")]
    InvalidExpenseStatus {
        expense_id: String,
        current_status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid account code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date range is inverted (end before start).
    #[error("{field}: end date precedes start date")]
    InvertedDateRange { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
