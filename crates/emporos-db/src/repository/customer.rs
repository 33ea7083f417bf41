//! # Customer Repository
//!
//! Customers, their running balance, and the branch → headquarters link.
//!
//! ```text
//! ┌───────────────────────────┐        ┌───────────────────────────┐
//! │ 0001 Headquarters         │◄───────│ 0002 Branch (is_branch)   │
//! │ balance += branch invoices│ parent │ orders, delivery notes    │
//! └───────────────────────────┘        └───────────────────────────┘
//! ```
//!
//! `balance` only changes through [`CustomerRepository::apply_balance_delta`],
//! which the balance ledger pairs with a `balance_postings` row.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{Customer, Money};

const CUSTOMER_COLUMNS: &str = r#"
    id, code, first_name, last_name, company_name, vat_number,
    address, city, postal_code, balance, credit_limit,
    parent_id, is_branch, can_be_invoiced, sales_rep_id,
    created_at, updated_at
"#;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_code(&mut conn, code).await
    }

    /// Lists customers ordered by code.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY code LIMIT ?1 OFFSET ?2");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    /// Branches billed through `parent_id`.
    pub async fn list_branches(&self, parent_id: &str) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE parent_id = ?1 ORDER BY code");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(customer)
    }

    pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE code = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(code)
            .fetch_optional(conn)
            .await?;
        Ok(customer)
    }

    /// Reads a customer that must exist.
    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Every customer code, for seeding the customer code counter.
    pub async fn all_codes(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT code FROM customers")
            .fetch_all(conn)
            .await?;
        Ok(codes)
    }

    /// Inserts a new customer.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, code = %customer.code, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, code, first_name, last_name, company_name, vat_number,
                address, city, postal_code, balance, credit_limit,
                parent_id, is_branch, can_be_invoiced, sales_rep_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.code)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company_name)
        .bind(&customer.vat_number)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.postal_code)
        .bind(customer.balance)
        .bind(customer.credit_limit)
        .bind(&customer.parent_id)
        .bind(customer.is_branch)
        .bind(customer.can_be_invoiced)
        .bind(&customer.sales_rep_id)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds `amount` to the balance (positive = customer owes more) and
    /// returns the new balance.
    pub async fn apply_balance_delta(
        conn: &mut SqliteConnection,
        id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        debug!(id = %id, amount = %amount, "Updating balance");

        let balance: Option<Money> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET balance = balance + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        balance.ok_or_else(|| DbError::not_found("Customer", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::fixtures::sample_customer;

    #[tokio::test]
    async fn test_balance_delta_accumulates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = sample_customer("0001");

        let mut tx = db.begin_write().await.unwrap();
        CustomerRepository::insert(tx.conn(), &customer).await.unwrap();
        CustomerRepository::apply_balance_delta(tx.conn(), &customer.id, Money::from_cents(12_400), Utc::now())
            .await
            .unwrap();
        let balance = CustomerRepository::apply_balance_delta(
            tx.conn(),
            &customer.id,
            Money::from_cents(-2_400),
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(balance, Money::from_cents(10_000));
        let stored = db.customers().get_by_code("0001").await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn test_branch_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hq = sample_customer("0001");
        let mut branch = sample_customer("0002");
        branch.parent_id = Some(hq.id.clone());
        branch.is_branch = true;

        let mut tx = db.begin_write().await.unwrap();
        CustomerRepository::insert(tx.conn(), &hq).await.unwrap();
        CustomerRepository::insert(tx.conn(), &branch).await.unwrap();
        let codes = CustomerRepository::all_codes(tx.conn()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(codes.len(), 2);
        let branches = db.customers().list_branches(&hq.id).await.unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].code, "0002");
    }
}
