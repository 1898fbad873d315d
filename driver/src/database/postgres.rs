use error_stack::{Report, ResultExt};
use sqlx::{Error, PgConnection, Pool, Postgres};

use kernel::interface::config::{
    DependOnRentalConfig, ReadConcern, RentalConfig, TransactionOptions, WriteConcern,
};
use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::query::{DependOnCustomerQuery, DependOnMovieQuery, DependOnRentalQuery};
use kernel::interface::update::{
    DependOnCustomerModifier, DependOnMovieModifier, DependOnRentalModifier,
};
use kernel::KernelError;

use crate::config::load_rental_config;
use crate::env;
use crate::error::ConvertError;

pub use self::{customer::*, movie::*, rental::*};

mod customer;
mod movie;
mod rental;

static POSTGRES_URL: &str = "POSTGRES_URL";

pub struct PostgresDatabase {
    pool: Pool<Postgres>,
    config: RentalConfig,
    customers: PostgresCustomerRepository,
    movies: PostgresMovieRepository,
    rentals: PostgresRentalRepository,
}

impl PostgresDatabase {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        Self::with_config(load_rental_config()?).await
    }

    pub async fn with_config(config: RentalConfig) -> error_stack::Result<Self, KernelError> {
        let url = env(POSTGRES_URL)?;
        let pool = Pool::connect(&url).await.convert_error()?;
        Ok(Self::with_pool(pool, config))
    }

    pub fn with_pool(pool: Pool<Postgres>, config: RentalConfig) -> Self {
        Self {
            customers: PostgresCustomerRepository::new(pool.clone()),
            movies: PostgresMovieRepository::new(pool.clone()),
            rentals: PostgresRentalRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    pub async fn migrate(&self) -> error_stack::Result<(), KernelError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .change_context_lazy(|| KernelError::Internal)
            .attach_printable_lazy(|| "Failed to run migrations")
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PostgresDatabase {
    type Transaction = PostgresTransaction;
    async fn transact(
        &self,
        options: &TransactionOptions,
    ) -> error_stack::Result<Self::Transaction, KernelError> {
        options.ensure_primary()?;
        let transaction = self.pool.begin().await.convert_error()?;
        let mut transaction = PostgresTransaction(Some(transaction));
        PgSessionInternal::configure(transaction.connection()?, options).await?;
        Ok(transaction)
    }
}

/// `None` once the unit of work was committed or rolled back.
pub struct PostgresTransaction(Option<sqlx::Transaction<'static, Postgres>>);

impl PostgresTransaction {
    pub(in crate::database) fn connection(
        &mut self,
    ) -> error_stack::Result<&mut PgConnection, KernelError> {
        self.0.as_deref_mut().ok_or_else(|| {
            Report::new(KernelError::Internal).attach_printable("Transaction already finished")
        })
    }
}

#[async_trait::async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(&mut self) -> error_stack::Result<(), KernelError> {
        match self.0.take() {
            Some(transaction) => transaction.commit().await.convert_error(),
            None => Err(Report::new(KernelError::Internal)
                .attach_printable("Cannot commit a finished transaction")),
        }
    }

    async fn roll_back(&mut self) -> error_stack::Result<(), KernelError> {
        match self.0.take() {
            Some(transaction) => transaction.rollback().await.convert_error(),
            None => Ok(()),
        }
    }

    async fn end_session(mut self) -> error_stack::Result<(), KernelError> {
        // the connection goes back to the pool when the transaction is dropped
        if let Some(transaction) = self.0.take() {
            transaction.rollback().await.convert_error()?;
        }
        Ok(())
    }
}

struct PgSessionInternal;

impl PgSessionInternal {
    async fn configure(
        con: &mut PgConnection,
        options: &TransactionOptions,
    ) -> error_stack::Result<(), KernelError> {
        // A blocked `FOR UPDATE` re-reads the latest row under READ COMMITTED.
        // SERIALIZABLE fails it with 40001 instead, retried as `Concurrency`.
        let isolation = match options.read_concern() {
            ReadConcern::Local | ReadConcern::Majority => "READ COMMITTED",
            ReadConcern::Linearizable => "SERIALIZABLE",
        };
        let synchronous_commit = match options.write_concern() {
            WriteConcern::Acknowledged => "local",
            WriteConcern::Majority => "on",
            WriteConcern::All => "remote_apply",
        };
        let timeout = options.timeout().as_millis().to_string();

        sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {isolation}"))
            .execute(&mut *con)
            .await
            .convert_error()?;
        // language=postgresql
        sqlx::query(
            r#"
            SELECT
                set_config('synchronous_commit', $1, true),
                set_config('statement_timeout', $2, true),
                set_config('idle_in_transaction_session_timeout', $2, true)
            "#,
        )
        .bind(synchronous_commit)
        .bind(timeout)
        .execute(&mut *con)
        .await
        .convert_error()?;
        Ok(())
    }
}

impl DependOnRentalConfig for PostgresDatabase {
    fn rental_config(&self) -> &RentalConfig {
        &self.config
    }
}

impl DependOnCustomerQuery for PostgresDatabase {
    type CustomerQuery = PostgresCustomerRepository;
    fn customer_query(&self) -> &Self::CustomerQuery {
        &self.customers
    }
}

impl DependOnCustomerModifier for PostgresDatabase {
    type CustomerModifier = PostgresCustomerRepository;
    fn customer_modifier(&self) -> &Self::CustomerModifier {
        &self.customers
    }
}

impl DependOnMovieQuery for PostgresDatabase {
    type MovieQuery = PostgresMovieRepository;
    fn movie_query(&self) -> &Self::MovieQuery {
        &self.movies
    }
}

impl DependOnMovieModifier for PostgresDatabase {
    type MovieModifier = PostgresMovieRepository;
    fn movie_modifier(&self) -> &Self::MovieModifier {
        &self.movies
    }
}

impl DependOnRentalQuery for PostgresDatabase {
    type RentalQuery = PostgresRentalRepository;
    fn rental_query(&self) -> &Self::RentalQuery {
        &self.rentals
    }
}

impl DependOnRentalModifier for PostgresDatabase {
    type RentalModifier = PostgresRentalRepository;
    fn rental_modifier(&self) -> &Self::RentalModifier {
        &self.rentals
    }
}

impl<T: 'static> ConvertError for Result<T, Error> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let context = match &error {
                Error::PoolTimedOut => KernelError::Timeout,
                Error::Database(database) => match database.code().as_deref() {
                    // serialization_failure, deadlock_detected, lock_not_available
                    Some("40001" | "40P01" | "55P03") => KernelError::Concurrency,
                    // query_canceled (statement_timeout), idle_in_transaction_session_timeout
                    Some("57014" | "25P03") => KernelError::Timeout,
                    _ => KernelError::Internal,
                },
                _ => KernelError::Internal,
            };
            Report::new(error).change_context(context)
        })
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::config::{
        ReadConcern, ReadPreference, TransactionOptions, WriteConcern,
    };
    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::KernelError;
    use std::time::Duration;

    use crate::database::postgres::PostgresDatabase;
    use crate::error::ConvertError;

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn transaction_settings() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        let options = TransactionOptions::new(
            ReadPreference::Primary,
            ReadConcern::Linearizable,
            WriteConcern::Acknowledged,
            Duration::from_millis(1500),
        );
        let mut transaction = db.transact(&options).await?;
        let con = transaction.connection()?;

        let (isolation,): (String,) = sqlx::query_as("SHOW transaction_isolation")
            .fetch_one(&mut *con)
            .await
            .convert_error()?;
        assert_eq!(isolation, "serializable");

        let (timeout,): (String,) = sqlx::query_as("SHOW statement_timeout")
            .fetch_one(&mut *con)
            .await
            .convert_error()?;
        assert_eq!(timeout, "1500ms");

        transaction.roll_back().await?;
        transaction.end_session().await?;
        Ok(())
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn majority_reads_lock_at_read_committed() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        for read_concern in [ReadConcern::Local, ReadConcern::Majority] {
            let options = TransactionOptions::new(
                ReadPreference::Primary,
                read_concern,
                WriteConcern::Majority,
                Duration::from_secs(1),
            );
            let mut transaction = db.transact(&options).await?;
            let (isolation,): (String,) = sqlx::query_as("SHOW transaction_isolation")
                .fetch_one(&mut *transaction.connection()?)
                .await
                .convert_error()?;
            assert_eq!(isolation, "read committed");
            transaction.end_session().await?;
        }
        Ok(())
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn secondary_read_preference_is_rejected() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        let options = TransactionOptions::new(
            ReadPreference::Secondary,
            ReadConcern::Local,
            WriteConcern::Majority,
            Duration::from_secs(1),
        );
        assert!(db.transact(&options).await.is_err());
        Ok(())
    }
}
