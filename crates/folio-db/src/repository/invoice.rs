//! # Invoice Repository
//!
//! Invoice creation, status lifecycle, payment application, and
//! recurrence scheduling.
//!
//! ## Payment Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  record_payment (one transaction)                                   │
//! │                                                                     │
//! │  1. Fetch invoice, validate via Invoice::apply_payment              │
//! │     (rejects drafts, cancelled, paid, and overpayment)              │
//! │  2. INSERT invoice_payments row                                     │
//! │  3. UPDATE invoices SET paid/payment_status/status                  │
//! │     guarded by the paid_minor value read in step 1                  │
//! │                                                                     │
//! │  record_payment_posted adds the paired ledger legs to the same      │
//! │  transaction: debit the cash account, credit receivables, both      │
//! │  tagged with reference_kind = 'invoice'.                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are derived from line items at creation and never edited
//! afterwards; an issued invoice changes through payments and status
//! transitions only.

use chrono::{NaiveDate, Utc};
use sqlx::{SqlitePool, Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::journal::{self, NewJournalEntry};
use folio_core::validation::{validate_name, validate_non_negative_minor};
use folio_core::{
    CoreError, EntryType, Invoice, InvoiceItem, InvoicePayment, InvoiceStatus, Money,
    PaymentMethod, RecurringFrequency, ReferenceKind,
};

const SELECT_INVOICE: &str = r#"
    SELECT id, client_id, store_id, invoice_number, customer_id,
           subtotal_minor, tax_minor, discount_minor, total_minor, paid_minor,
           status, payment_status, issue_date, due_date,
           is_recurring, recurring_frequency, next_invoice_date,
           created_at, updated_at
    FROM invoices
"#;

/// One line of a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: String,
    pub store_id: Option<String>,
    pub customer_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_minor: i64,
    pub discount_minor: i64,
    pub is_recurring: bool,
    pub recurring_frequency: Option<RecurringFrequency>,
    pub items: Vec<NewInvoiceItem>,
}

/// Repository for invoice operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates a draft invoice with its line items.
    ///
    /// Totals are derived here: subtotal is the sum of line totals,
    /// total = subtotal + tax - discount.
    pub async fn create(&self, new: NewInvoice) -> DbResult<Invoice> {
        if new.items.is_empty() {
            return Err(folio_core::ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }
        validate_non_negative_minor("tax", new.tax_minor)?;
        validate_non_negative_minor("discount", new.discount_minor)?;
        folio_core::validation::validate_period(new.issue_date, new.due_date)?;
        for item in &new.items {
            validate_name(&item.description)?;
            if item.quantity <= 0 {
                return Err(folio_core::ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
            validate_non_negative_minor("unit_price", item.unit_price_minor)?;
        }

        let subtotal_minor: i64 = new
            .items
            .iter()
            .map(|i| i.quantity * i.unit_price_minor)
            .sum();
        let total_minor = subtotal_minor + new.tax_minor - new.discount_minor;
        validate_non_negative_minor("total", total_minor)?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let invoice_number = generate_invoice_number(new.issue_date);
        let next_invoice_date = if new.is_recurring {
            new.recurring_frequency.map(|f| f.advance(new.issue_date))
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, client_id, store_id, invoice_number, customer_id,
                subtotal_minor, tax_minor, discount_minor, total_minor, paid_minor,
                status, payment_status, issue_date, due_date,
                is_recurring, recurring_frequency, next_invoice_date,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0,
                      'draft', 'unpaid', ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            "#,
        )
        .bind(&id)
        .bind(&new.client_id)
        .bind(&new.store_id)
        .bind(&invoice_number)
        .bind(&new.customer_id)
        .bind(subtotal_minor)
        .bind(new.tax_minor)
        .bind(new.discount_minor)
        .bind(total_minor)
        .bind(new.issue_date)
        .bind(new.due_date)
        .bind(new.is_recurring)
        .bind(new.recurring_frequency)
        .bind(next_invoice_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, description, quantity, unit_price_minor,
                    line_total_minor, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_minor)
            .bind(item.quantity * item.unit_price_minor)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(invoice = %invoice_number, total_minor, "Created invoice");

        self.require(&id).await
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// The line items of an invoice.
    pub async fn items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, description, quantity, unit_price_minor,
                   line_total_minor, created_at
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// The payments recorded against an invoice, oldest first.
    pub async fn payments(&self, invoice_id: &str) -> DbResult<Vec<InvoicePayment>> {
        let payments = sqlx::query_as::<_, InvoicePayment>(
            r#"
            SELECT id, invoice_id, amount_minor, method, payment_date, created_at
            FROM invoice_payments
            WHERE invoice_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Issues a draft invoice to the customer.
    pub async fn send(&self, id: &str) -> DbResult<Invoice> {
        self.transition(id, InvoiceStatus::Sent).await
    }

    /// Marks a sent invoice as viewed by the customer.
    pub async fn mark_viewed(&self, id: &str) -> DbResult<Invoice> {
        self.transition(id, InvoiceStatus::Viewed).await
    }

    /// Cancels a non-terminal invoice.
    pub async fn cancel(&self, id: &str) -> DbResult<Invoice> {
        self.transition(id, InvoiceStatus::Cancelled).await
    }

    /// Applies a status transition guarded by the status that was read.
    async fn transition(&self, id: &str, to: InvoiceStatus) -> DbResult<Invoice> {
        let invoice = self.require(id).await?;

        if !invoice.status.can_transition(to) {
            return Err(CoreError::InvalidStatusTransition {
                from: invoice.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(to)
        .bind(Utc::now())
        .bind(invoice.status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::contention("Invoice", id));
        }

        debug!(invoice_id = %id, from = %invoice.status, to = %to, "Invoice status transition");

        self.require(id).await
    }

    /// Records a payment against an invoice.
    ///
    /// ## Errors
    /// - `InvalidStatusTransition` if the invoice does not accept payments
    /// - `Overpayment` if the amount exceeds the outstanding balance
    /// - `Contention` if a concurrent payment won the paid_minor guard
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        amount_minor: i64,
        method: PaymentMethod,
        payment_date: NaiveDate,
    ) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        self.apply_payment_tx(&mut tx, invoice_id, amount_minor, method, payment_date)
            .await?;
        tx.commit().await?;

        self.require(invoice_id).await
    }

    /// Records a payment and posts the paired ledger legs atomically:
    /// debit the cash account, credit the receivables account, both
    /// referencing the invoice.
    ///
    /// Either everything lands (payment row, invoice state, two posted
    /// legs, two balance updates) or nothing does.
    pub async fn record_payment_posted(
        &self,
        invoice_id: &str,
        amount_minor: i64,
        method: PaymentMethod,
        payment_date: NaiveDate,
        cash_account_id: &str,
        receivable_account_id: &str,
        actor: &str,
    ) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        let invoice = self
            .apply_payment_tx(&mut tx, invoice_id, amount_minor, method, payment_date)
            .await?;

        for (account_id, entry_type) in [
            (cash_account_id, EntryType::Debit),
            (receivable_account_id, EntryType::Credit),
        ] {
            let entry = journal::create_entry_tx(
                &mut tx,
                NewJournalEntry {
                    client_id: invoice.client_id.clone(),
                    store_id: invoice.store_id.clone(),
                    entry_date: payment_date,
                    account_id: account_id.to_string(),
                    entry_type,
                    amount_minor,
                    description: format!("Payment on {}", invoice.invoice_number),
                    reference_kind: Some(ReferenceKind::Invoice),
                    reference_id: Some(invoice_id.to_string()),
                },
            )
            .await?;
            journal::post_entry_tx(&mut tx, &entry.id, actor).await?;
        }

        tx.commit().await?;

        info!(invoice_id = %invoice_id, amount_minor, "Recorded and posted invoice payment");

        self.require(invoice_id).await
    }

    /// Payment application within an open transaction. Returns the
    /// invoice as it was before the payment.
    async fn apply_payment_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        invoice_id: &str,
        amount_minor: i64,
        method: PaymentMethod,
        payment_date: NaiveDate,
    ) -> DbResult<Invoice> {
        if amount_minor <= 0 {
            return Err(CoreError::InvalidAmount { amount_minor }.into());
        }

        let invoice =
            sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = ?1"))
                .bind(invoice_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| CoreError::InvoiceNotFound(invoice_id.to_string()))?;

        let (new_paid, payment_status, status) =
            invoice.apply_payment(Money::from_minor(amount_minor))?;

        sqlx::query(
            r#"
            INSERT INTO invoice_payments (id, invoice_id, amount_minor, method, payment_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(invoice_id)
        .bind(amount_minor)
        .bind(method)
        .bind(payment_date)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET paid_minor = ?2, payment_status = ?3, status = ?4, updated_at = ?5
            WHERE id = ?1 AND paid_minor = ?6
            "#,
        )
        .bind(invoice_id)
        .bind(new_paid)
        .bind(payment_status)
        .bind(status)
        .bind(Utc::now())
        .bind(invoice.paid_minor)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::contention("Invoice", invoice_id));
        }

        Ok(invoice)
    }

    /// Sweeps a client's past-due invoices into `overdue`.
    ///
    /// Idempotent: invoices already overdue (or paid, cancelled, draft)
    /// are untouched. Returns the number of invoices transitioned.
    pub async fn mark_overdue(&self, client_id: &str, today: NaiveDate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = ?3
            WHERE client_id = ?1
              AND status IN ('sent', 'viewed', 'partial')
              AND due_date < ?2
            "#,
        )
        .bind(client_id)
        .bind(today)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                client_id = %client_id,
                count = result.rows_affected(),
                "Marked invoices overdue"
            );
        }

        Ok(result.rows_affected())
    }

    /// Advances a recurring invoice's next issue date by one period.
    pub async fn schedule_next(&self, id: &str) -> DbResult<Invoice> {
        let invoice = self.require(id).await?;

        let frequency = match (invoice.is_recurring, invoice.recurring_frequency) {
            (true, Some(f)) => f,
            _ => {
                return Err(CoreError::InvalidStatusTransition {
                    from: "non-recurring".to_string(),
                    to: "scheduled".to_string(),
                }
                .into())
            }
        };

        let base = invoice.next_invoice_date.unwrap_or(invoice.issue_date);
        let next = frequency.advance(base);

        sqlx::query("UPDATE invoices SET next_invoice_date = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(next)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.require(id).await
    }

    /// Lists a client's invoices in a given status.
    pub async fn list_by_status(
        &self,
        client_id: &str,
        status: InvoiceStatus,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "{SELECT_INVOICE} WHERE client_id = ?1 AND status = ?2 ORDER BY issue_date, invoice_number"
        ))
        .bind(client_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    async fn require(&self, id: &str) -> DbResult<Invoice> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(id.to_string()).into())
    }
}

/// Generates a unique invoice number: date-prefixed for humans, with a
/// random suffix for uniqueness.
fn generate_invoice_number(issue_date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
        issue_date.format("%Y%m%d"),
        &suffix[..8].to_uppercase()
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
