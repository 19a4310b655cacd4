//! # Seed Data Generator
//!
//! Populates a development database with a demo chart of accounts, an
//! opening transaction, an invoice with a payment, and a budgeted
//! expense, then prints the trial balance.
//!
//! ## Usage
//! ```bash
//! cargo run -p folio-db --bin seed
//!
//! # Specify database path
//! cargo run -p folio-db --bin seed -- --db ./data/folio.db
//!
//! # Verbose SQL / repository logging
//! RUST_LOG=debug cargo run -p folio-db --bin seed
//! ```

use std::collections::HashMap;
use std::env;

use chrono::NaiveDate;
use folio_core::{AccountType, EntryType, PaymentMethod};
use folio_db::{
    Database, DbConfig, NewAccount, NewAllocation, NewExpense, NewInvoice, NewInvoiceItem,
    NewJournalEntry,
};
use tracing_subscriber::EnvFilter;

const CLIENT: &str = "demo-client";

/// (code, name, type) rows of the demo chart of accounts.
const CHART: &[(&str, &str, AccountType)] = &[
    ("1000", "Cash", AccountType::Asset),
    ("1100", "Accounts Receivable", AccountType::Asset),
    ("2000", "Accounts Payable", AccountType::Liability),
    ("3000", "Owner's Equity", AccountType::Equity),
    ("4000", "Sales Revenue", AccountType::Revenue),
    ("5000", "Rent Expense", AccountType::Expense),
    ("5100", "Supplies Expense", AccountType::Expense),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./folio_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Folio Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./folio_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Folio Seed Data Generator");
    println!("=========================");
    println!("Database: {db_path}");
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.accounts().list_by_type(CLIENT, AccountType::Asset).await?;
    if !existing.is_empty() {
        println!("⚠ Database already seeded, delete the file to regenerate.");
        return Ok(());
    }

    // Chart of accounts
    let mut accounts = HashMap::new();
    for (code, name, account_type) in CHART {
        let account = db
            .accounts()
            .create(NewAccount {
                client_id: CLIENT.to_string(),
                store_id: None,
                code: code.to_string(),
                name: name.to_string(),
                account_type: *account_type,
                parent_id: None,
            })
            .await?;
        accounts.insert(*code, account.id);
    }
    println!("✓ Created {} accounts", CHART.len());

    let date = |m, day| NaiveDate::from_ymd_opt(2026, m, day).expect("valid date");
    let journal = db.journal();

    // Opening capital: debit Cash, credit Owner's Equity
    let leg = |account: &str, entry_type, amount_minor, description: &str| NewJournalEntry {
        client_id: CLIENT.to_string(),
        store_id: None,
        entry_date: date(1, 1),
        account_id: accounts[account].clone(),
        entry_type,
        amount_minor,
        description: description.to_string(),
        reference_kind: None,
        reference_id: None,
    };
    let debit = journal
        .create_entry(leg("1000", EntryType::Debit, 10_000_000, "Opening capital"))
        .await?;
    let credit = journal
        .create_entry(leg("3000", EntryType::Credit, 10_000_000, "Opening capital"))
        .await?;
    journal.post_transaction(&[&debit.id, &credit.id], "seed").await?;
    println!("✓ Posted opening capital ({})", debit.entry_number);

    // Invoice: issue, send, take a partial then final payment
    let invoice = db
        .invoices()
        .create(NewInvoice {
            client_id: CLIENT.to_string(),
            store_id: None,
            customer_id: "cust-acme".to_string(),
            issue_date: date(1, 10),
            due_date: date(1, 31),
            tax_minor: 100_000,
            discount_minor: 0,
            is_recurring: false,
            recurring_frequency: None,
            items: vec![
                NewInvoiceItem {
                    description: "Consulting".to_string(),
                    quantity: 10,
                    unit_price_minor: 80_000,
                },
                NewInvoiceItem {
                    description: "Support retainer".to_string(),
                    quantity: 1,
                    unit_price_minor: 200_000,
                },
            ],
        })
        .await?;
    db.invoices().send(&invoice.id).await?;
    db.invoices()
        .record_payment_posted(
            &invoice.id,
            400_000,
            PaymentMethod::BankTransfer,
            date(1, 15),
            &accounts["1000"],
            &accounts["1100"],
            "seed",
        )
        .await?;
    let invoice = db
        .invoices()
        .record_payment_posted(
            &invoice.id,
            invoice.total_minor - 400_000,
            PaymentMethod::BankTransfer,
            date(1, 20),
            &accounts["1000"],
            &accounts["1100"],
            "seed",
        )
        .await?;
    println!(
        "✓ Invoice {} fully paid ({} minor units)",
        invoice.invoice_number, invoice.total_minor
    );

    // Budget + approved expense
    db.budgets()
        .allocate(NewAllocation {
            client_id: CLIENT.to_string(),
            store_id: None,
            category_id: "cat-rent".to_string(),
            period_start: date(1, 1),
            period_end: date(1, 31),
            total_minor: 2_000_000,
        })
        .await?;
    let expense = db
        .expenses()
        .create(NewExpense {
            client_id: CLIENT.to_string(),
            store_id: None,
            expense_account_id: accounts["5000"].clone(),
            offset_account_id: accounts["1000"].clone(),
            category_id: "cat-rent".to_string(),
            amount_minor: 1_500_000,
            expense_date: date(1, 5),
            description: "January rent".to_string(),
        })
        .await?;
    db.expenses().approve(&expense.id, "seed").await?;
    println!("✓ Approved rent expense against the budget");

    // Trial balance
    let tb = db.ledger().trial_balance(CLIENT, date(1, 31)).await?;
    println!();
    println!("Trial balance as of 2026-01-31");
    println!("  debits:  {:>12}", tb.debit_minor);
    println!("  credits: {:>12}", tb.credit_minor);
    println!(
        "  {}",
        if tb.is_balanced() {
            "✓ balanced"
        } else {
            "✗ NOT BALANCED"
        }
    );

    let findings = db.ledger().verify_client(CLIENT).await?;
    println!(
        "  integrity sweep: {} inconsistent account(s)",
        findings.len()
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
