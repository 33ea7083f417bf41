//! Builders shared by the ledger tests.

use std::path::PathBuf;

use chrono::Utc;

use emporos_core::{
    new_id, Actor, Customer, Money, Order, Percent, Product, Quantity, ShippingDetails,
    UnitOfMeasure,
};
use emporos_db::{Database, DbConfig};

use crate::config::LedgerConfig;
use crate::ledger::Ledger;
use crate::lifecycle::{NewCustomer, NewOrder, NewOrderLine, NewProduct};

/// Fresh in-memory ledger with default configuration.
pub(crate) async fn ledger() -> Ledger {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Ledger::new(db, LedgerConfig::default())
}

/// File-backed ledger with a multi-connection pool, for concurrency tests.
pub(crate) async fn file_ledger() -> (Ledger, PathBuf) {
    let path = std::env::temp_dir().join(format!("emporos-test-{}.db", new_id()));
    let config = LedgerConfig {
        database_path: path.clone(),
        max_connections: 4,
        ..LedgerConfig::default()
    };
    (Ledger::open(config).await.unwrap(), path)
}

/// Pieces at 100.00, cost 60.00, VAT 24%.
pub(crate) fn product_input(code: &str, stock: i64) -> NewProduct {
    NewProduct {
        code: code.to_string(),
        name: format!("Product {code}"),
        unit_of_measurement: UnitOfMeasure::Pcs,
        price: Money::from_cents(10_000),
        cost_price: Money::from_cents(6_000),
        vat_percentage: Percent::whole(24),
        opening_stock: Quantity::units(stock),
        min_stock_level: Quantity::units(2),
    }
}

pub(crate) fn customer_input(name: &str) -> NewCustomer {
    NewCustomer {
        first_name: name.to_string(),
        last_name: "Customer".to_string(),
        company_name: Some(format!("{name} Ltd")),
        vat_number: Some("EL123456789".to_string()),
        city: Some("Athens".to_string()),
        ..NewCustomer::default()
    }
}

/// Order dated today; each line is `(product_id, whole units)` at the product's price.
pub(crate) fn order_input<S: AsRef<str>>(customer_id: Option<&str>, lines: &[(S, i64)]) -> NewOrder {
    NewOrder {
        customer_id: customer_id.map(str::to_string),
        order_date: Utc::now().date_naive(),
        delivery_date: None,
        shipping: ShippingDetails::default(),
        comments: None,
        lines: lines
            .iter()
            .map(|(product_id, units)| NewOrderLine {
                product_id: Some(product_id.as_ref().to_string()),
                quantity: Quantity::units(*units),
                ..NewOrderLine::default()
            })
            .collect(),
    }
}

pub(crate) async fn stock_of(ledger: &Ledger, product_id: &str) -> Quantity {
    ledger
        .database()
        .products()
        .get_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

/// A completed order of `units` pieces for a new customer, from a product with 20 in stock.
pub(crate) async fn completed_order(ledger: &Ledger, units: i64) -> (Order, Customer, Product) {
    let customer = ledger
        .create_customer(customer_input("Alpha"), &Actor::system())
        .await
        .unwrap();
    let (order, product) = completed_order_for(ledger, &customer, units).await;
    (order, customer, product)
}

/// A completed order for `customer`, from a fresh product with 20 in stock.
pub(crate) async fn completed_order_for(ledger: &Ledger, customer: &Customer, units: i64) -> (Order, Product) {
    let actor = Actor::system();
    let id = new_id();
    let code = format!("SKU-{}", &id[id.len() - 12..]);
    let product = ledger.create_product(product_input(&code, 20), &actor).await.unwrap();

    let order = ledger
        .create_order(order_input(Some(customer.id.as_str()), &[(product.id.as_str(), units)]), &actor)
        .await
        .unwrap();
    let order = ledger.complete_order(&order.id, &actor).await.unwrap();
    (order, product)
}
