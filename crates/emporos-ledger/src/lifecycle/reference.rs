//! # Reference Data
//!
//! Products, customers, sales reps and suppliers. Thin on purpose: the
//! only ledger effects here are a product's opening stock and the
//! customer code counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use emporos_core::validation::{validate_code, validate_name, validate_percent, validate_price};
use emporos_core::{
    new_id, ActionKind, Actor, Customer, Money, Percent, Product, Quantity, RepType, SalesRep,
    StockReason, Supplier, UnitOfMeasure, ValidationError,
};
use emporos_db::{CustomerRepository, ProductRepository, SalesRepRepository, SupplierRepository};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::numbering::next_customer_code;
use crate::stock;

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub unit_of_measurement: UnitOfMeasure,
    pub price: Money,
    #[serde(default)]
    pub cost_price: Money,
    pub vat_percentage: Percent,
    /// Applied as an `opening_balance` stock movement.
    #[serde(default)]
    pub opening_stock: Quantity,
    #[serde(default)]
    pub min_stock_level: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    /// Assigned from the customer counter when absent.
    pub code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub credit_limit: Money,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_branch: bool,
    #[serde(default = "default_true")]
    pub can_be_invoiced: bool,
    pub sales_rep_id: Option<String>,
}

impl Default for NewCustomer {
    fn default() -> Self {
        NewCustomer {
            code: None,
            first_name: String::new(),
            last_name: String::new(),
            company_name: None,
            vat_number: None,
            address: None,
            city: None,
            postal_code: None,
            credit_limit: Money::zero(),
            parent_id: None,
            is_branch: false,
            can_be_invoiced: true,
            sales_rep_id: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSalesRep {
    pub name: String,
    pub rep_type: RepType,
    pub commission_rate: Percent,
    pub phone: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

impl Ledger {
    /// Creates a product; any opening stock goes through the stock journal.
    pub async fn create_product(&self, input: NewProduct, actor: &Actor) -> LedgerResult<Product> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let product = insert_product(tx.conn(), input, actor, now)
            .await
            .map_err(|e| rejected("create_product", e))?;

        tx.commit().await?;
        info!(code = %product.code, stock = %product.stock_quantity, actor = %actor.name, "Product created");
        Ok(product)
    }

    pub async fn create_customer(&self, input: NewCustomer, actor: &Actor) -> LedgerResult<Customer> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let customer = insert_customer(tx.conn(), input, attempts, actor, now)
            .await
            .map_err(|e| rejected("create_customer", e))?;

        tx.commit().await?;
        info!(code = %customer.code, name = %customer.display_name(), actor = %actor.name, "Customer created");
        Ok(customer)
    }

    pub async fn create_sales_rep(&self, input: NewSalesRep, actor: &Actor) -> LedgerResult<SalesRep> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            validate_name("name", &input.name)?;
            validate_percent("commission_rate", input.commission_rate)?;

            let rep = SalesRep {
                id: new_id(),
                name: input.name.trim().to_string(),
                rep_type: input.rep_type,
                commission_rate: input.commission_rate,
                phone: input.phone,
                created_at: now,
            };
            SalesRepRepository::insert(tx.conn(), &rep).await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::Create,
                Subject::new("SalesRep", &rep.id, &rep.name),
                format!("Commission rate {}", rep.commission_rate),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(rep)
        }
        .await;
        let rep = result.map_err(|e| rejected("create_sales_rep", e))?;

        tx.commit().await?;
        info!(name = %rep.name, rate = %rep.commission_rate, actor = %actor.name, "Sales rep created");
        Ok(rep)
    }

    pub async fn create_supplier(
        &self,
        name: &str,
        vat_number: Option<String>,
        actor: &Actor,
    ) -> LedgerResult<Supplier> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            validate_name("name", name)?;

            let supplier = Supplier {
                id: new_id(),
                name: name.trim().to_string(),
                vat_number,
                created_at: now,
            };
            match SupplierRepository::insert(tx.conn(), &supplier).await {
                Ok(()) => {}
                Err(e) if e.is_unique_violation_on("suppliers.name") => {
                    return Err(duplicate("name", &supplier.name));
                }
                Err(e) => return Err(e.into()),
            }
            audit::record(
                tx.conn(),
                actor,
                ActionKind::Create,
                Subject::new("Supplier", &supplier.id, &supplier.name),
                "",
                now,
            )
            .await?;
            Ok::<_, LedgerError>(supplier)
        }
        .await;
        let supplier = result.map_err(|e| rejected("create_supplier", e))?;

        tx.commit().await?;
        info!(name = %supplier.name, actor = %actor.name, "Supplier created");
        Ok(supplier)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

async fn insert_product(
    conn: &mut SqliteConnection,
    input: NewProduct,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Product> {
    validate_code("code", &input.code)?;
    validate_name("name", &input.name)?;
    validate_price("price", input.price)?;
    validate_price("cost_price", input.cost_price)?;
    validate_percent("vat_percentage", input.vat_percentage)?;
    if input.opening_stock.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "opening_stock".to_string(),
        }
        .into());
    }

    let code = input.code.trim().to_string();
    if ProductRepository::find_by_code(conn, &code).await?.is_some() {
        return Err(duplicate("code", &code));
    }

    let mut product = Product {
        id: new_id(),
        code,
        name: input.name.trim().to_string(),
        unit_of_measurement: input.unit_of_measurement,
        price: input.price,
        cost_price: input.cost_price,
        vat_percentage: input.vat_percentage,
        stock_quantity: Quantity::zero(),
        min_stock_level: input.min_stock_level,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    ProductRepository::insert(conn, &product).await?;

    product.stock_quantity = stock::adjust(
        conn,
        &product.id,
        input.opening_stock,
        StockReason::OpeningBalance,
        None,
        now,
    )
    .await?;

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("Product", &product.id, &product.code),
        format!("Opening stock {}", product.stock_quantity),
        now,
    )
    .await?;

    Ok(product)
}

pub(crate) async fn insert_customer(
    conn: &mut SqliteConnection,
    input: NewCustomer,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Customer> {
    validate_name("first_name", &input.first_name)?;
    if let Some(code) = &input.code {
        validate_code("code", code)?;
    }
    validate_price("credit_limit", input.credit_limit)?;

    if input.is_branch {
        let parent_id = input
            .parent_id
            .as_deref()
            .ok_or_else(|| ValidationError::required("parent_id"))?;
        CustomerRepository::find(conn, parent_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Customer", parent_id))?;
    }
    if let Some(rep_id) = input.sales_rep_id.as_deref() {
        SalesRepRepository::find(conn, rep_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("SalesRep", rep_id))?;
    }

    let mut customer = Customer {
        id: new_id(),
        code: String::new(),
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        company_name: input.company_name,
        vat_number: input.vat_number,
        address: input.address,
        city: input.city,
        postal_code: input.postal_code,
        balance: Money::zero(),
        credit_limit: input.credit_limit,
        parent_id: input.parent_id,
        is_branch: input.is_branch,
        can_be_invoiced: input.can_be_invoiced,
        sales_rep_id: input.sales_rep_id,
        created_at: now,
        updated_at: now,
    };

    match input.code {
        Some(code) => {
            customer.code = code.trim().to_string();
            match CustomerRepository::insert(conn, &customer).await {
                Ok(()) => {}
                Err(e) if e.is_unique_violation_on("customers.code") => {
                    return Err(duplicate("code", &customer.code));
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => insert_with_next_code(conn, &mut customer, attempts).await?,
    }

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("Customer", &customer.id, &customer.code),
        customer.display_name(),
        now,
    )
    .await?;

    Ok(customer)
}

async fn insert_with_next_code(
    conn: &mut SqliteConnection,
    customer: &mut Customer,
    attempts: u32,
) -> LedgerResult<()> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        customer.code = next_customer_code(conn).await?;
        match CustomerRepository::insert(conn, customer).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_unique_violation_on("customers.code") => {
                warn!(code = %customer.code, attempt, "Customer code already taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(LedgerError::NumberingExhausted {
        prefix: emporos_core::numbering::CUSTOMER_COUNTER_PREFIX,
        year: 0,
        attempts,
    })
}

fn duplicate(field: &str, value: &str) -> LedgerError {
    ValidationError::Duplicate {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{customer_input, ledger, product_input};

    #[tokio::test]
    async fn test_opening_stock_is_a_movement() {
        let ledger = ledger().await;
        let product = ledger
            .create_product(product_input("SKU1", 20), &Actor::system())
            .await
            .unwrap();

        assert_eq!(product.stock_quantity, Quantity::units(20));
        let movements = ledger.database().journals().movements_for_product(&product.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, StockReason::OpeningBalance);
    }

    #[tokio::test]
    async fn test_duplicate_product_code() {
        let ledger = ledger().await;
        let actor = Actor::system();
        ledger.create_product(product_input("SKU1", 0), &actor).await.unwrap();

        let err = ledger.create_product(product_input("SKU1", 0), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_customer_codes_are_sequential() {
        let ledger = ledger().await;
        let actor = Actor::system();

        let first = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let second = ledger.create_customer(customer_input("Beta"), &actor).await.unwrap();

        assert_eq!(first.code, "0001");
        assert_eq!(second.code, "0002");
    }

    #[tokio::test]
    async fn test_branch_requires_parent() {
        let ledger = ledger().await;
        let actor = Actor::system();

        let mut branch = customer_input("Branch");
        branch.is_branch = true;
        let err = ledger.create_customer(branch.clone(), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let hq = ledger.create_customer(customer_input("HQ"), &actor).await.unwrap();
        branch.parent_id = Some(hq.id.clone());
        let branch = ledger.create_customer(branch, &actor).await.unwrap();
        assert_eq!(branch.parent_id.as_deref(), Some(hq.id.as_str()));
    }

    #[tokio::test]
    async fn test_duplicate_supplier_name() {
        let ledger = ledger().await;
        let actor = Actor::system();
        ledger.create_supplier("Olive Co", None, &actor).await.unwrap();

        let err = ledger.create_supplier("Olive Co", None, &actor).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(emporos_core::CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }
}
