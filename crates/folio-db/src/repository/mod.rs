//! # Repository Modules
//!
//! One repository per aggregate, all backed by the shared pool:
//!
//! - [`account`] - chart of accounts (tree, lifecycle, balances)
//! - [`journal`] - journal entries and the posting engine
//! - [`ledger`] - general-ledger reads: statements, trial balance,
//!   reconciliation
//! - [`invoice`] - invoices, payment application, recurrence
//! - [`expense`] - approval-gated expense documents
//! - [`budget`] - budget allocations and spend tracking

pub mod account;
pub mod budget;
pub mod expense;
pub mod invoice;
pub mod journal;
pub mod ledger;
