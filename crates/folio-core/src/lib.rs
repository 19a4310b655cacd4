//! # folio-core: Pure Business Logic for the Folio Ledger Engine
//!
//! This crate is the **heart** of Folio. It contains all ledger business
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Folio Architecture                           │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │      Host application (POS, invoicing, expense approval)    │   │
//! │  └─────────────────────────────┬───────────────────────────────┘   │
//! │                                │ in-process calls                   │
//! │  ┌─────────────────────────────▼───────────────────────────────┐   │
//! │  │               ★ folio-core (THIS CRATE) ★                   │   │
//! │  │                                                             │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────┐ │   │
//! │  │  │  types  │ │  money  │ │ invoice │ │ budget  │ │ valid.│ │   │
//! │  │  │ Account │ │  Money  │ │ Invoice │ │ Budget  │ │ rules │ │   │
//! │  │  │ Journal │ │  (i64)  │ │ Payment │ │ Expense │ │ checks│ │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘ └───────┘ │   │
//! │  │                                                             │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS         │   │
//! │  └─────────────────────────────┬───────────────────────────────┘   │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼───────────────────────────────┐   │
//! │  │                  folio-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, atomic posting            │   │
//! │  └──────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Chart of accounts, journal entries, general ledger
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`invoice`] - Invoices, line items, payment application
//! - [`budget`] - Budget allocations and expense records
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are minor units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//! 5. **One sign convention**: `AccountType::signed_delta` is the only
//!    place debit/credit direction is turned into arithmetic
//!
//! ## Example Usage
//!
//! ```rust
//! use folio_core::money::Money;
//! use folio_core::types::{AccountType, EntryType};
//!
//! // Debiting an asset account increases its balance
//! let delta = AccountType::Asset.signed_delta(EntryType::Debit, Money::from_minor(500_000));
//! assert_eq!(delta.minor(), 500_000);
//!
//! // Crediting it decreases the balance
//! let delta = AccountType::Asset.signed_delta(EntryType::Credit, Money::from_minor(500_000));
//! assert_eq!(delta.minor(), -500_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod budget;
pub mod error;
pub mod invoice;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use folio_core::Money` instead of
// `use folio_core::money::Money`

pub use budget::{periods_overlap, BudgetAllocation, BudgetStatus, ExpenseRecord, ExpenseStatus};
pub use error::{CoreError, CoreResult, ValidationError};
pub use invoice::{
    Invoice, InvoiceItem, InvoicePayment, InvoiceStatus, PaymentMethod, PaymentStatus,
    RecurringFrequency,
};
pub use money::Money;
pub use types::{
    Account, AccountNode, AccountStatus, AccountType, EntryReference, EntryType,
    GeneralLedgerEntry, JournalEntry, PostingAction, PostingLogEntry, ReferenceKind, TrialBalance,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum depth of the chart-of-accounts tree (root = depth 1).
///
/// ## Business Reason
/// Bounds parent-chain walks and keeps hierarchies legible. Five levels
/// covers every standard chart layout (class / group / account /
/// sub-account / detail).
pub const MAX_ACCOUNT_DEPTH: usize = 5;
