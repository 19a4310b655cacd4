//! # folio-db: Storage Layer for the Folio Ledger
//!
//! This crate persists the Folio double-entry ledger. It uses SQLite for
//! local storage with sqlx for async operations; folio-core supplies the
//! domain types and every pure rule (sign convention, status machines,
//! payment application).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Folio Data Flow                                 │
//! │                                                                         │
//! │  Host application (POS, accounting UI, batch jobs)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     folio-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ AccountRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ JournalRepo    │    │ 001_ledger_  │  │   │
//! │  │   │ Connection    │    │ LedgerRepo     │    │   schema.sql │  │   │
//! │  │   │ Management    │    │ InvoiceRepo    │    │              │  │   │
//! │  │   │               │    │ ExpenseRepo    │    │              │  │   │
//! │  │   │               │    │ BudgetRepo     │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (account, journal, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/folio.db")).await?;
//!
//! // Draft and post a balanced pair of journal entries
//! let debit = db.journal().create_entry(debit_leg).await?;
//! let credit = db.journal().create_entry(credit_leg).await?;
//! db.journal()
//!     .post_transaction(&[&debit.id, &credit.id], "cashier")
//!     .await?;
//!
//! let tb = db.ledger().trial_balance("client-1", today).await?;
//! assert!(tb.is_balanced());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{AccountRepository, NewAccount};
pub use repository::budget::{BudgetRepository, NewAllocation};
pub use repository::expense::{ExpenseRepository, NewExpense};
pub use repository::invoice::{InvoiceRepository, NewInvoice, NewInvoiceItem};
pub use repository::journal::{JournalRepository, NewJournalEntry};
pub use repository::ledger::{LedgerLine, LedgerRepository, VerificationReport};
