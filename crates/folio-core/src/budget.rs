//! # Budget & Expense Types
//!
//! Budget allocations track spend against a category over a date window;
//! expense records are the approval-gated documents that feed them.
//!
//! ## Flow
//! ```text
//! expense created (pending)
//!      │
//!      ▼ approve
//! paired journal legs posted (debit expense account, credit offset)
//!      +
//! covering allocation's spent_minor incremented, status rederived
//! ```
//!
//! Status derivation is pure: `exceeded` beats everything once spend
//! passes the budget; otherwise the date window decides active/completed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Budget Allocation
// =============================================================================

/// Lifecycle of a budget allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Active,
    Completed,
    Exceeded,
}

impl BudgetStatus {
    /// Rederives the status after a spend or on a date boundary.
    ///
    /// `exceeded` is sticky in effect: once spent > total it wins even
    /// past the period end, because an overshot budget stays a finding.
    pub fn derive(spent: Money, total: Money, period_end: NaiveDate, today: NaiveDate) -> Self {
        if spent > total {
            BudgetStatus::Exceeded
        } else if today > period_end {
            BudgetStatus::Completed
        } else {
            BudgetStatus::Active
        }
    }
}

/// A budget for one category over one date window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BudgetAllocation {
    pub id: String,
    pub client_id: String,
    pub store_id: Option<String>,
    pub category_id: String,

    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    pub total_minor: i64,
    pub spent_minor: i64,
    pub status: BudgetStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BudgetAllocation {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    #[inline]
    pub fn spent(&self) -> Money {
        Money::from_minor(self.spent_minor)
    }

    /// Budget still available; negative once exceeded.
    #[inline]
    pub fn remaining(&self) -> Money {
        self.total() - self.spent()
    }

    /// Whether this allocation's window covers a date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}

/// Inclusive date-range overlap test used by the allocation uniqueness
/// rule: one active allocation per category per overlapping window.
pub fn periods_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

// =============================================================================
// Expense Record
// =============================================================================

/// Approval state of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }
}

/// An expense document awaiting or past approval.
///
/// Approval posts the paired journal legs (debit `expense_account_id`,
/// credit `offset_account_id`) and increments the covering allocation's
/// spend in one atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExpenseRecord {
    pub id: String,
    pub client_id: String,
    pub store_id: Option<String>,

    /// Expense account debited on approval.
    pub expense_account_id: String,

    /// Cash/payable account credited on approval.
    pub offset_account_id: String,

    /// Budget category this expense counts against.
    pub category_id: String,

    pub amount_minor: i64,
    pub expense_date: NaiveDate,
    pub description: String,

    pub status: ExpenseStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpenseRecord {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
