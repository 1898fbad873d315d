use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use kernel::interface::query::CustomerQuery;
use kernel::interface::update::CustomerModifier;
use kernel::prelude::entity::{Customer, CustomerId, CustomerIsGold, CustomerName, CustomerPhone};
use kernel::KernelError;

use crate::error::ConvertError;

pub struct PostgresCustomerRepository {
    pool: Pool<Postgres>,
}

impl PostgresCustomerRepository {
    pub(in crate::database) fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerQuery for PostgresCustomerRepository {
    async fn find_by_id(
        &self,
        id: &CustomerId,
    ) -> error_stack::Result<Option<Customer>, KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgCustomerInternal::find_by_id(&mut con, id).await
    }
}

#[async_trait::async_trait]
impl CustomerModifier for PostgresCustomerRepository {
    async fn create(&self, customer: &Customer) -> error_stack::Result<(), KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgCustomerInternal::create(&mut con, customer).await
    }

    async fn update(&self, customer: &Customer) -> error_stack::Result<(), KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgCustomerInternal::update(&mut con, customer).await
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    phone: String,
    is_gold: bool,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer::new(
            CustomerId::new(row.id),
            CustomerName::new(row.name),
            CustomerPhone::new(row.phone),
            CustomerIsGold::new(row.is_gold),
        )
    }
}

pub(in crate::database) struct PgCustomerInternal;

impl PgCustomerInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &CustomerId,
    ) -> error_stack::Result<Option<Customer>, KernelError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            // language=postgresql
            r#"
            SELECT id, name, phone, is_gold
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Customer::from))
    }

    async fn create(
        con: &mut PgConnection,
        customer: &Customer,
    ) -> error_stack::Result<(), KernelError> {
        sqlx::query(
            // language=postgresql
            r#"
            INSERT INTO customers (id, name, phone, is_gold)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(customer.id().as_ref())
        .bind(customer.name().as_ref())
        .bind(customer.phone().as_ref())
        .bind(customer.is_gold().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(
        con: &mut PgConnection,
        customer: &Customer,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, is_gold = $4
            WHERE id = $1
            "#,
        )
        .bind(customer.id().as_ref())
        .bind(customer.name().as_ref())
        .bind(customer.phone().as_ref())
        .bind(customer.is_gold().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use kernel::interface::query::CustomerQuery;
    use kernel::interface::update::CustomerModifier;
    use kernel::prelude::entity::{
        Customer, CustomerId, CustomerIsGold, CustomerName, CustomerPhone,
    };
    use kernel::KernelError;

    use crate::database::postgres::PostgresDatabase;

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn find_by_id() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let id = CustomerId::new(Uuid::new_v4());
        let customer = Customer::new(
            id.clone(),
            CustomerName::new("test"),
            CustomerPhone::new("0123456789"),
            CustomerIsGold::new(false),
        );

        db.customers.create(&customer).await?;
        let found = db.customers.find_by_id(&id).await?;
        assert_eq!(found, Some(customer.clone()));

        let customer = customer.reconstruct(|c| {
            c.name = CustomerName::new("test2");
            c.is_gold = CustomerIsGold::new(true);
        });
        db.customers.update(&customer).await?;
        let found = db.customers.find_by_id(&id).await?;
        assert_eq!(found, Some(customer));

        let missing = db
            .customers
            .find_by_id(&CustomerId::new(Uuid::new_v4()))
            .await?;
        assert!(missing.is_none());
        Ok(())
    }
}
