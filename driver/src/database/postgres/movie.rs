use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use kernel::interface::query::MovieQuery;
use kernel::interface::update::{MovieModifier, StockUpdate};
use kernel::prelude::entity::{DailyRentalRate, Movie, MovieId, MovieStock, MovieTitle};
use kernel::KernelError;

use crate::database::postgres::PostgresTransaction;
use crate::error::ConvertError;

pub struct PostgresMovieRepository {
    pool: Pool<Postgres>,
}

impl PostgresMovieRepository {
    pub(in crate::database) fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MovieQuery for PostgresMovieRepository {
    type Transaction = PostgresTransaction;

    async fn find_by_id(&self, id: &MovieId) -> error_stack::Result<Option<Movie>, KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgMovieInternal::find_by_id(&mut con, id).await
    }

    async fn find_by_id_for_update(
        &self,
        con: &mut PostgresTransaction,
        id: &MovieId,
    ) -> error_stack::Result<Option<Movie>, KernelError> {
        PgMovieInternal::find_by_id_for_update(con.connection()?, id).await
    }
}

#[async_trait::async_trait]
impl MovieModifier for PostgresMovieRepository {
    type Transaction = PostgresTransaction;

    async fn create(&self, movie: &Movie) -> error_stack::Result<(), KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgMovieInternal::create(&mut con, movie).await
    }

    async fn update(&self, movie: &Movie) -> error_stack::Result<(), KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgMovieInternal::update(&mut con, movie).await
    }

    async fn delete(&self, id: &MovieId) -> error_stack::Result<(), KernelError> {
        let mut con = self.pool.acquire().await.convert_error()?;
        PgMovieInternal::delete(&mut con, id).await
    }

    async fn decrement_stock(
        &self,
        con: &mut PostgresTransaction,
        id: &MovieId,
        amount: &MovieStock,
    ) -> error_stack::Result<StockUpdate, KernelError> {
        PgMovieInternal::decrement_stock(con.connection()?, id, amount).await
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    number_in_stock: i32,
    daily_rental_rate: Decimal,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie::new(
            MovieId::new(row.id),
            MovieTitle::new(row.title),
            MovieStock::new(row.number_in_stock),
            DailyRentalRate::new(row.daily_rental_rate),
        )
    }
}

#[derive(sqlx::FromRow)]
struct StockUpdateRow {
    matched: bool,
    modified: bool,
}

pub(in crate::database) struct PgMovieInternal;

impl PgMovieInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &MovieId,
    ) -> error_stack::Result<Option<Movie>, KernelError> {
        let row = sqlx::query_as::<_, MovieRow>(
            // language=postgresql
            r#"
            SELECT id, title, number_in_stock, daily_rental_rate
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Movie::from))
    }

    async fn find_by_id_for_update(
        con: &mut PgConnection,
        id: &MovieId,
    ) -> error_stack::Result<Option<Movie>, KernelError> {
        let row = sqlx::query_as::<_, MovieRow>(
            // language=postgresql
            r#"
            SELECT id, title, number_in_stock, daily_rental_rate
            FROM movies
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Movie::from))
    }

    async fn create(con: &mut PgConnection, movie: &Movie) -> error_stack::Result<(), KernelError> {
        sqlx::query(
            // language=postgresql
            r#"
            INSERT INTO movies (id, title, number_in_stock, daily_rental_rate)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(movie.id().as_ref())
        .bind(movie.title().as_ref())
        .bind(movie.number_in_stock().as_ref())
        .bind(movie.daily_rental_rate().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(con: &mut PgConnection, movie: &Movie) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            UPDATE movies
            SET title = $2, number_in_stock = $3, daily_rental_rate = $4
            WHERE id = $1
            "#,
        )
        .bind(movie.id().as_ref())
        .bind(movie.title().as_ref())
        .bind(movie.number_in_stock().as_ref())
        .bind(movie.daily_rental_rate().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn delete(con: &mut PgConnection, id: &MovieId) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            DELETE FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn decrement_stock(
        con: &mut PgConnection,
        id: &MovieId,
        amount: &MovieStock,
    ) -> error_stack::Result<StockUpdate, KernelError> {
        let row = sqlx::query_as::<_, StockUpdateRow>(
            // language=postgresql
            r#"
            WITH updated AS (
                UPDATE movies
                SET number_in_stock = number_in_stock - $2
                WHERE id = $1 AND number_in_stock >= $2
                RETURNING id
            )
            SELECT
                EXISTS(SELECT 1 FROM movies WHERE id = $1) AS matched,
                EXISTS(SELECT 1 FROM updated) AS modified
            "#,
        )
        .bind(id.as_ref())
        .bind(amount.as_ref())
        .fetch_one(con)
        .await
        .convert_error()?;
        tracing::debug!(
            "Stock decrement of movie {}: matched {}, modified {}",
            id.as_ref(),
            row.matched,
            row.modified
        );
        Ok(StockUpdate::new(row.matched, row.modified))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use kernel::interface::config::TransactionOptions;
    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::MovieQuery;
    use kernel::interface::update::{MovieModifier, StockUpdate};
    use kernel::prelude::entity::{DailyRentalRate, Movie, MovieId, MovieStock, MovieTitle};
    use kernel::KernelError;

    use crate::database::postgres::PostgresDatabase;

    fn movie(stock: i32) -> Movie {
        Movie::new(
            MovieId::new(Uuid::new_v4()),
            MovieTitle::new("Terminator"),
            MovieStock::new(stock),
            DailyRentalRate::new(dec!(2.50)),
        )
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn create_and_update() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let movie = movie(3);

        db.movies.create(&movie).await?;
        let found = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(found, Some(movie.clone()));

        let movie = movie.reconstruct(|m| {
            m.title = MovieTitle::new("Terminator 2");
            m.daily_rental_rate = DailyRentalRate::new(dec!(3.00));
        });
        db.movies.update(&movie).await?;
        let found = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(found, Some(movie.clone()));

        db.movies.delete(movie.id()).await?;
        assert!(db.movies.find_by_id(movie.id()).await?.is_none());
        Ok(())
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn decrement_is_guarded() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let movie = movie(1);
        db.movies.create(&movie).await?;

        let mut transaction = db.transact(&TransactionOptions::default()).await?;
        let locked = db
            .movies
            .find_by_id_for_update(&mut transaction, movie.id())
            .await?;
        assert_eq!(locked, Some(movie.clone()));

        let one = MovieStock::new(1);
        let first = db
            .movies
            .decrement_stock(&mut transaction, movie.id(), &one)
            .await?;
        assert_eq!(first, StockUpdate::new(true, true));
        let second = db
            .movies
            .decrement_stock(&mut transaction, movie.id(), &one)
            .await?;
        assert_eq!(second, StockUpdate::new(true, false));
        let missing = db
            .movies
            .decrement_stock(&mut transaction, &MovieId::new(Uuid::new_v4()), &one)
            .await?;
        assert_eq!(missing, StockUpdate::new(false, false));
        transaction.commit().await?;
        transaction.end_session().await?;

        let found = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(found.map(|m| *m.number_in_stock()), Some(MovieStock::new(0)));
        Ok(())
    }
}
