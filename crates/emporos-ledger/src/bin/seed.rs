//! # Seed Data Generator
//!
//! Populates a development database by running a realistic day of business
//! through the ledger operations.
//!
//! ## Usage
//! ```bash
//! # Default database
//! cargo run -p emporos-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p emporos-ledger --bin seed -- --db ./data/emporos.db
//! ```
//!
//! ## What Gets Created
//! - Two sales representatives (a salesperson and an agent)
//! - A headquarters customer with one branch, plus the retail customer
//! - One supplier and four products (pieces, kilograms and boxes)
//! - Orders → delivery notes → invoices, a payment, a credit note,
//!   a purchase order receipt and a retail sale
//!
//! Finishes with the balance reconciliation of every seeded customer.

use std::env;
use std::path::PathBuf;

use chrono::Utc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use emporos_core::{
    Actor, DeliveryNoteStatus, Money, PaymentMethod, Percent, Purpose, Quantity, RepType,
    ShippingDetails, UnitOfMeasure,
};
use emporos_ledger::{
    CreditNoteRequest, InvoiceOptions, Ledger, LedgerConfig, NewCustomer, NewOrder, NewOrderLine,
    NewPayment, NewProduct, NewPurchaseOrder, NewPurchaseOrderLine, NewRetailLine,
    NewRetailReceipt, NewSalesRep, ReceiveLine, ReturnLine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./emporos_dev.db");

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
                println!("Emporos Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./emporos_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    println!("🌱 Emporos Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let config = LedgerConfig {
        database_path: PathBuf::from(&db_path),
        ..LedgerConfig::from_env()?
    };
    let ledger = Ledger::open(config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.database().products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let actor = Actor::new("seed", "Seed");
    let today = Utc::now().date_naive();

    // -------------------------------------------------------------------------
    // Reference data
    // -------------------------------------------------------------------------

    let rep = ledger
        .create_sales_rep(
            NewSalesRep {
                name: "Nikos Georgiou".to_string(),
                rep_type: RepType::Sales,
                commission_rate: Percent::whole(5),
                phone: Some("+30 210 000 0001".to_string()),
            },
            &actor,
        )
        .await?;
    ledger
        .create_sales_rep(
            NewSalesRep {
                name: "Eleni Agent".to_string(),
                rep_type: RepType::Agent,
                commission_rate: Percent::from_bps(350),
                phone: None,
            },
            &actor,
        )
        .await?;

    let hq = ledger
        .create_customer(
            NewCustomer {
                first_name: "Maria".to_string(),
                last_name: "Papadopoulou".to_string(),
                company_name: Some("Papadopoulou Trading".to_string()),
                vat_number: Some("EL123456789".to_string()),
                address: Some("Ermou 10".to_string()),
                city: Some("Athens".to_string()),
                postal_code: Some("10563".to_string()),
                credit_limit: Money::from_cents(500_000),
                sales_rep_id: Some(rep.id.clone()),
                ..NewCustomer::default()
            },
            &actor,
        )
        .await?;
    let branch = ledger
        .create_customer(
            NewCustomer {
                first_name: "Kostas".to_string(),
                last_name: "Papadopoulos".to_string(),
                company_name: Some("Papadopoulou Trading (Thessaloniki)".to_string()),
                city: Some("Thessaloniki".to_string()),
                parent_id: Some(hq.id.clone()),
                is_branch: true,
                ..NewCustomer::default()
            },
            &actor,
        )
        .await?;
    let retail = ledger
        .create_customer(
            NewCustomer {
                code: Some(ledger.config().retail_customer_code.clone()),
                first_name: "Retail".to_string(),
                last_name: "Customer".to_string(),
                can_be_invoiced: false,
                ..NewCustomer::default()
            },
            &actor,
        )
        .await?;
    println!("✓ Customers: {}, {} (branch), {}", hq.code, branch.code, retail.code);

    let supplier = ledger
        .create_supplier("Aegean Wholesale", Some("EL987654321".to_string()), &actor)
        .await?;

    let mut products = Vec::new();
    for (code, name, unit, price, cost, stock) in [
        ("OIL-5L", "Olive Oil 5L", UnitOfMeasure::Pcs, 4_500, 3_100, 40),
        ("FETA-KG", "Feta Cheese", UnitOfMeasure::Kg, 1_250, 800, 25),
        ("HONEY-1KG", "Thyme Honey 1kg", UnitOfMeasure::Pcs, 1_800, 1_100, 30),
        ("OLIVES-BOX", "Kalamata Olives", UnitOfMeasure::Box, 2_400, 1_500, 12),
    ] {
        let product = ledger
            .create_product(
                NewProduct {
                    code: code.to_string(),
                    name: name.to_string(),
                    unit_of_measurement: unit,
                    price: Money::from_cents(price),
                    cost_price: Money::from_cents(cost),
                    vat_percentage: Percent::whole(13),
                    opening_stock: Quantity::units(stock),
                    min_stock_level: Quantity::units(5),
                },
                &actor,
            )
            .await?;
        products.push(product);
    }
    println!("✓ Products: {}", products.len());

    // -------------------------------------------------------------------------
    // Sales flow
    // -------------------------------------------------------------------------

    // Headquarters: order → delivery note → invoice → paid
    let order = ledger
        .create_order(
            NewOrder {
                customer_id: Some(hq.id.clone()),
                order_date: today,
                delivery_date: None,
                shipping: ShippingDetails {
                    purpose: Some(Purpose::Sale),
                    carrier: Some("ACS".to_string()),
                    ..ShippingDetails::default()
                },
                comments: None,
                lines: vec![
                    line(&products[0].id, Quantity::units(6)),
                    line(&products[1].id, Quantity::from_hundredths(250)),
                ],
            },
            &actor,
        )
        .await?;
    let order = ledger.complete_order(&order.id, &actor).await?;
    let note = ledger.create_delivery_note_from_order(&order.id, &actor).await?;
    ledger
        .set_delivery_note_status(&note.id, DeliveryNoteStatus::Shipped, &actor)
        .await?;
    let invoice = ledger
        .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
        .await?;
    let invoice = ledger.mark_invoice_paid(&invoice.id, &actor).await?;
    println!("✓ {} → {} → {} ({})", order.order_number, note.delivery_note_number, invoice.invoice_number, invoice.status);

    // Branch: delivery note invoiced to headquarters, paid in part
    let order = ledger
        .create_order(
            NewOrder {
                customer_id: Some(branch.id.clone()),
                order_date: today,
                delivery_date: None,
                shipping: ShippingDetails::default(),
                comments: None,
                lines: vec![line(&products[2].id, Quantity::units(10))],
            },
            &actor,
        )
        .await?;
    let order = ledger.complete_order(&order.id, &actor).await?;
    let note = ledger.create_delivery_note_from_order(&order.id, &actor).await?;
    let invoice = ledger
        .create_invoice_from_delivery_note(&note.id, InvoiceOptions::default(), &actor)
        .await?;
    let payment = ledger
        .record_payment(
            NewPayment {
                customer_id: hq.id.clone(),
                payment_date: today,
                amount_paid: Money::from_cents(10_000),
                payment_method: PaymentMethod::BankTransfer,
                reference_number: Some("TRX-0001".to_string()),
                notes: None,
                invoice_ids: vec![invoice.id.clone()],
            },
            &actor,
        )
        .await?;
    println!("✓ {} billed to {}, {} applied", invoice.invoice_number, hq.code, payment.amount_paid);

    // Return against a third invoice
    let order = ledger
        .create_order(
            NewOrder {
                customer_id: Some(hq.id.clone()),
                order_date: today,
                delivery_date: None,
                shipping: ShippingDetails::default(),
                comments: None,
                lines: vec![line(&products[3].id, Quantity::units(4))],
            },
            &actor,
        )
        .await?;
    let order = ledger.complete_order(&order.id, &actor).await?;
    let invoice = ledger
        .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
        .await?;
    let items = ledger.database().invoices().get_items(&invoice.id).await?;
    let credit_note = ledger
        .create_credit_note(
            &invoice.id,
            CreditNoteRequest {
                issue_date: today,
                reason: Some("Damaged in transit".to_string()),
                lines: items
                    .iter()
                    .map(|item| ReturnLine {
                        invoice_item_id: item.id.clone(),
                        quantity: Quantity::units(1),
                    })
                    .collect(),
            },
            &actor,
        )
        .await?;
    println!("✓ {} against {} ({})", credit_note.credit_note_number, invoice.invoice_number, credit_note.total_amount);

    // -------------------------------------------------------------------------
    // Purchasing and retail
    // -------------------------------------------------------------------------

    let purchase = ledger
        .create_purchase_order(
            NewPurchaseOrder {
                supplier_id: supplier.id.clone(),
                order_date: today,
                expected_delivery_date: None,
                notes: None,
                lines: vec![NewPurchaseOrderLine {
                    product_id: products[0].id.clone(),
                    quantity: Quantity::units(24),
                    cost_price: None,
                }],
            },
            &actor,
        )
        .await?;
    ledger.mark_purchase_order_ordered(&purchase.id, &actor).await?;
    let purchase_items = ledger.database().purchase_orders().get_items(&purchase.id).await?;
    let purchase = ledger
        .receive_purchase_order(
            &purchase.id,
            vec![ReceiveLine {
                item_id: purchase_items[0].id.clone(),
                quantity: Quantity::units(12),
            }],
            &actor,
        )
        .await?;
    println!("✓ {} ({})", purchase.po_number, purchase.status);

    let receipt = ledger
        .create_retail_receipt(
            NewRetailReceipt {
                customer_id: None,
                issue_date: Utc::now(),
                lines: vec![NewRetailLine {
                    product_id: products[2].id.clone(),
                    quantity: Quantity::units(2),
                    unit_price: None,
                    discount_percentage: Percent::zero(),
                }],
            },
            &actor,
        )
        .await?;
    println!("✓ {} ({})", receipt.receipt_number, receipt.total_amount);

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    println!();
    println!("Customer balances");
    println!("  {:<8} {:>12} {:>12} {:>12}  ok", "code", "recorded", "derived", "journal");
    for customer in [&hq, &branch, &retail] {
        let r = ledger.reconcile_customer(&customer.id).await?;
        println!(
            "  {:<8} {:>12} {:>12} {:>12}  {}",
            customer.code,
            r.recorded.to_string(),
            r.derived.to_string(),
            r.journal.to_string(),
            if r.is_consistent() { "✓" } else { "✗" }
        );
    }

    println!();
    println!("Stock");
    for product in &products {
        let s = ledger.stock_conservation(&product.id).await?;
        println!(
            "  {:<12} {:>8} {}",
            product.code,
            s.recorded.to_string(),
            if s.holds() { "✓" } else { "✗" }
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn line(product_id: &str, quantity: Quantity) -> NewOrderLine {
    NewOrderLine {
        product_id: Some(product_id.to_string()),
        quantity,
        ..NewOrderLine::default()
    }
}

/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,emporos=info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
