use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, Pool, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use kernel::interface::query::RentalQuery;
use kernel::interface::update::RentalModifier;
use kernel::prelude::entity::{
    CustomerSnapshot, DateOut, DateReturned, MovieSnapshot, Rental, RentalFee, RentalId,
};
use kernel::KernelError;

use crate::database::postgres::PostgresTransaction;
use crate::error::ConvertError;

pub struct PostgresRentalRepository {
    pool: Pool<Postgres>,
}

impl PostgresRentalRepository {
    pub(in crate::database) fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RentalQuery for PostgresRentalRepository {
    async fn find_by_id(
        &self,
        id: &RentalId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgRentalInternal::find_by_id(&mut con, id).await
    }

    async fn find_all(&self) -> error_stack::Result<Vec<Rental>, KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgRentalInternal::find_all(&mut con).await
    }
}

#[async_trait::async_trait]
impl RentalModifier for PostgresRentalRepository {
    type Transaction = PostgresTransaction;

    async fn create(
        &self,
        con: &mut PostgresTransaction,
        rental: &Rental,
    ) -> error_stack::Result<(), KernelError> {
        PgRentalInternal::create(con.connection()?, rental).await
    }
}

#[derive(sqlx::FromRow)]
struct RentalRow {
    id: Uuid,
    customer: Json<CustomerSnapshot>,
    movie: Json<MovieSnapshot>,
    date_out: OffsetDateTime,
    date_returned: Option<OffsetDateTime>,
    rental_fee: Option<Decimal>,
}

impl From<RentalRow> for Rental {
    fn from(row: RentalRow) -> Self {
        Rental::new(
            RentalId::new(row.id),
            row.customer.0,
            row.movie.0,
            DateOut::new(row.date_out),
            row.date_returned.map(DateReturned::new),
            row.rental_fee.map(RentalFee::new),
        )
    }
}

pub(in crate::database) struct PgRentalInternal;

impl PgRentalInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &RentalId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        let row = sqlx::query_as::<_, RentalRow>(
            // language=postgresql
            r#"
            SELECT id, customer, movie, date_out, date_returned, rental_fee
            FROM rentals
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Rental::from))
    }

    async fn find_all(con: &mut PgConnection) -> error_stack::Result<Vec<Rental>, KernelError> {
        let rows = sqlx::query_as::<_, RentalRow>(
            // language=postgresql
            r#"
            SELECT id, customer, movie, date_out, date_returned, rental_fee
            FROM rentals
            ORDER BY date_out DESC
            "#,
        )
        .fetch_all(con)
        .await
        .convert_error()?;
        Ok(rows.into_iter().map(Rental::from).collect())
    }

    async fn create(con: &mut PgConnection, rental: &Rental) -> error_stack::Result<(), KernelError> {
        sqlx::query(
            // language=postgresql
            r#"
            INSERT INTO rentals (id, customer, movie, date_out, date_returned, rental_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(rental.id().as_ref())
        .bind(Json(rental.customer().clone()))
        .bind(Json(rental.movie().clone()))
        .bind(rental.date_out().as_ref())
        .bind(rental.date_returned().as_ref().map(AsRef::<OffsetDateTime>::as_ref))
        .bind(rental.rental_fee().as_ref().map(AsRef::<Decimal>::as_ref))
        .execute(con)
        .await
        .convert_error()?;
        tracing::debug!("Rental with id {} was inserted", rental.id().as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use kernel::interface::config::TransactionOptions;
    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::RentalQuery;
    use kernel::interface::update::{CustomerModifier, MovieModifier, RentalModifier};
    use kernel::prelude::entity::{
        Customer, CustomerId, CustomerIsGold, CustomerName, CustomerPhone, DailyRentalRate,
        Movie, MovieId, MovieStock, MovieTitle, Rental,
    };
    use kernel::KernelError;

    use crate::database::postgres::PostgresDatabase;

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn insert_commit_and_abort() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let customer = Customer::new(
            CustomerId::new(Uuid::new_v4()),
            CustomerName::new("name"),
            CustomerPhone::new("12345"),
            CustomerIsGold::new(false),
        );
        let movie = Movie::new(
            MovieId::new(Uuid::new_v4()),
            MovieTitle::new("title"),
            MovieStock::new(1),
            DailyRentalRate::new(dec!(1.50)),
        );
        db.customers.create(&customer).await?;
        db.movies.create(&movie).await?;

        let kept = Rental::create(&customer, &movie);
        let mut transaction = db.transact(&TransactionOptions::default()).await?;
        db.rentals.create(&mut transaction, &kept).await?;
        transaction.commit().await?;
        transaction.end_session().await?;

        let dropped = Rental::create(&customer, &movie);
        let mut transaction = db.transact(&TransactionOptions::default()).await?;
        db.rentals.create(&mut transaction, &dropped).await?;
        transaction.roll_back().await?;
        transaction.end_session().await?;

        let found = db.rentals.find_by_id(kept.id()).await?;
        assert_eq!(found, Some(kept.clone()));
        let found = db.rentals.find_by_id(dropped.id()).await?;
        assert!(found.is_none());

        let all = db.rentals.find_all().await?;
        assert!(all.iter().any(|rental| rental.id() == kept.id()));
        assert!(all
            .windows(2)
            .all(|pair| pair[0].date_out().as_ref() >= pair[1].date_out().as_ref()));
        Ok(())
    }
}
