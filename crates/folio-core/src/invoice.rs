//! # Invoice Types
//!
//! Invoices, line items, and payment application.
//!
//! ## Status Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Invoice Status Transitions                       │
//! │                                                                     │
//! │  draft ──send──► sent ──view──► viewed                              │
//! │                   │               │                                 │
//! │                   ├── payment ────┼──► partial ──payment──► paid    │
//! │                   │               │       │                         │
//! │                   └── due date passes ────┴──► overdue              │
//! │                                                 (payments still     │
//! │                                                  apply)             │
//! │                                                                     │
//! │  cancelled is reachable from any non-terminal state;                │
//! │  paid and cancelled are terminal.                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Invariant
//! `paid_minor` equals the sum of the invoice's payment rows, and
//! `payment_status` is always rederived from `paid_minor` vs `total_minor`
//! whenever a payment lands. Overpayment is rejected, not banked as credit.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Whether a direct transition to `to` is legal.
    ///
    /// Payments drive the partial/paid transitions; the overdue sweep
    /// drives sent/viewed/partial → overdue; send/view/cancel are explicit
    /// caller actions.
    pub fn can_transition(self, to: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        match (self, to) {
            (Draft, Sent) => true,
            (Sent, Viewed) => true,
            (Sent | Viewed | Overdue, Partial | Paid) => true,
            (Partial, Paid) => true,
            (Sent | Viewed | Partial, Overdue) => true,
            (Draft | Sent | Viewed | Partial | Overdue, Cancelled) => true,
            _ => false,
        }
    }

    /// States in which a payment may be applied.
    pub fn accepts_payment(self) -> bool {
        use InvoiceStatus::*;
        matches!(self, Sent | Viewed | Partial | Overdue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived payment state, a pure function of paid vs total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Rederives the payment status from amounts. Called every time a
    /// payment is recorded; never stored independently of `paid_minor`.
    pub fn derive(paid: Money, total: Money) -> PaymentStatus {
        if paid.is_zero() {
            PaymentStatus::Unpaid
        } else if paid < total {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    EWallet,
}

/// Recurrence schedule for recurring invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RecurringFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RecurringFrequency {
    /// Advances a date by one period.
    ///
    /// Month-based frequencies clamp to the last day of shorter months
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        match self {
            RecurringFrequency::Weekly => date + chrono::Duration::days(7),
            RecurringFrequency::Monthly => date + Months::new(1),
            RecurringFrequency::Quarterly => date + Months::new(3),
            RecurringFrequency::Yearly => date + Months::new(12),
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice with derived totals and payment tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub client_id: String,
    pub store_id: Option<String>,

    /// Unique business identifier (e.g. "INV-20260115-0001").
    pub invoice_number: String,

    pub customer_id: String,

    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,

    /// Sum of associated payment rows; maintained transactionally.
    pub paid_minor: i64,

    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,

    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,

    pub is_recurring: bool,
    pub recurring_frequency: Option<RecurringFrequency>,
    pub next_invoice_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_minor(self.paid_minor)
    }

    /// Amount still owed.
    #[inline]
    pub fn outstanding(&self) -> Money {
        self.total() - self.paid()
    }

    /// Validates a prospective payment and returns the resulting
    /// (paid_minor, payment_status, status) triple without mutating
    /// anything. The repository applies the result inside its
    /// transaction.
    pub fn apply_payment(
        &self,
        amount: Money,
    ) -> Result<(i64, PaymentStatus, InvoiceStatus), CoreError> {
        if !self.status.accepts_payment() {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: "partial/paid".to_string(),
            });
        }

        let new_paid = self.paid() + amount;
        if new_paid > self.total() {
            return Err(CoreError::Overpayment {
                invoice_id: self.id.clone(),
                attempted_minor: amount.minor(),
                outstanding_minor: self.outstanding().minor(),
            });
        }

        let payment_status = PaymentStatus::derive(new_paid, self.total());
        let status = match payment_status {
            PaymentStatus::Paid => InvoiceStatus::Paid,
            _ => InvoiceStatus::Partial,
        };

        Ok((new_paid.minor(), payment_status, status))
    }

    /// Whether the overdue sweep should pick this invoice up.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        use InvoiceStatus::*;
        matches!(self.status, Sent | Viewed | Partial) && self.due_date < today
    }
}

/// A single invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_minor(self.line_total_minor)
    }
}

/// A payment applied against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoicePayment {
    pub id: String,
    pub invoice_id: String,
    pub amount_minor: i64,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
