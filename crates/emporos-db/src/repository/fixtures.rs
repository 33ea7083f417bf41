//! Row builders shared by the repository tests.

use chrono::Utc;
use emporos_core::{new_id, Customer, Money, Percent, Product, Quantity, UnitOfMeasure};

pub(crate) fn sample_product(code: &str, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: new_id(),
        code: code.to_string(),
        name: format!("Product {code}"),
        unit_of_measurement: UnitOfMeasure::Pcs,
        price: Money::from_cents(10_000),
        cost_price: Money::from_cents(6_000),
        vat_percentage: Percent::whole(24),
        stock_quantity: Quantity::units(stock),
        min_stock_level: Quantity::units(2),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_customer(code: &str) -> Customer {
    let now = Utc::now();
    Customer {
        id: new_id(),
        code: code.to_string(),
        first_name: "Maria".to_string(),
        last_name: "Papadopoulou".to_string(),
        company_name: Some(format!("Company {code}")),
        vat_number: Some("EL123456789".to_string()),
        address: None,
        city: Some("Athens".to_string()),
        postal_code: None,
        balance: Money::zero(),
        credit_limit: Money::zero(),
        parent_id: None,
        is_branch: false,
        can_be_invoiced: true,
        sales_rep_id: None,
        created_at: now,
        updated_at: now,
    }
}
