use std::sync::Arc;

use error_stack::Report;

use kernel::interface::query::MovieQuery;
use kernel::interface::update::{MovieModifier, StockUpdate};
use kernel::prelude::entity::{Movie, MovieId, MovieStock};
use kernel::KernelError;

use crate::database::memory::{Fault, MemoryStore, MemoryTransaction};

#[derive(Clone)]
pub struct MemoryMovieRepository {
    store: Arc<MemoryStore>,
}

impl MemoryMovieRepository {
    pub(in crate::database) fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl MovieQuery for MemoryMovieRepository {
    type Transaction = MemoryTransaction;

    async fn find_by_id(&self, id: &MovieId) -> error_stack::Result<Option<Movie>, KernelError> {
        let collections = self.store.collections.read().await;
        Ok(collections.movies.get(id).cloned())
    }

    async fn find_by_id_for_update(
        &self,
        con: &mut MemoryTransaction,
        id: &MovieId,
    ) -> error_stack::Result<Option<Movie>, KernelError> {
        con.ensure_active()?;
        con.lock(id).await;
        Ok(con.read_movie(id).await)
    }
}

#[async_trait::async_trait]
impl MovieModifier for MemoryMovieRepository {
    type Transaction = MemoryTransaction;

    async fn create(&self, movie: &Movie) -> error_stack::Result<(), KernelError> {
        let mut collections = self.store.collections.write().await;
        collections.movies.insert(movie.id().clone(), movie.clone());
        Ok(())
    }

    async fn update(&self, movie: &Movie) -> error_stack::Result<(), KernelError> {
        let row = self.store.row_lock(movie.id());
        {
            let _guard = row.lock().await;
            let mut collections = self.store.collections.write().await;
            if let Some(stored) = collections.movies.get_mut(movie.id()) {
                *stored = movie.clone();
            }
        }
        drop(row);
        self.store.prune_row_locks([movie.id()]);
        Ok(())
    }

    async fn delete(&self, id: &MovieId) -> error_stack::Result<(), KernelError> {
        let row = self.store.row_lock(id);
        {
            let _guard = row.lock().await;
            let mut collections = self.store.collections.write().await;
            collections.movies.remove(id);
        }
        drop(row);
        self.store.prune_row_locks([id]);
        Ok(())
    }

    async fn decrement_stock(
        &self,
        con: &mut MemoryTransaction,
        id: &MovieId,
        amount: &MovieStock,
    ) -> error_stack::Result<StockUpdate, KernelError> {
        con.ensure_active()?;
        if self.store.take_fault(Fault::DecrementFailure) {
            return Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Failed to update stock of movie {}", id.as_ref())));
        }
        con.lock(id).await;
        let Some(movie) = con.read_movie(id).await else {
            return Ok(StockUpdate::new(false, false));
        };
        let update = match movie.number_in_stock().checked_take(amount) {
            Some(rest) => {
                con.stage_stock(id, rest);
                StockUpdate::new(true, true)
            }
            None => StockUpdate::new(true, false),
        };
        tracing::debug!(
            "Stock decrement of movie {}: matched {}, modified {}",
            id.as_ref(),
            update.matched(),
            update.modified()
        );
        Ok(update)
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

    use crate::database::memory::MemoryDatabase;

    fn movie(stock: i32) -> Movie {
        Movie::new(
            MovieId::new(Uuid::new_v4()),
            MovieTitle::new("Terminator"),
            MovieStock::new(stock),
            DailyRentalRate::new(dec!(2.50)),
        )
    }

    #[tokio::test]
    async fn staged_stock_is_invisible_until_commit() -> error_stack::Result<(), KernelError> {
        let db = MemoryDatabase::default();
        let movie = movie(2);
        db.movies.create(&movie).await?;

        let mut transaction = db.transact(&TransactionOptions::default()).await?;
        let one = MovieStock::new(1);
        let update = db
            .movies
            .decrement_stock(&mut transaction, movie.id(), &one)
            .await?;
        assert_eq!(update, StockUpdate::new(true, true));

        let inside = db
            .movies
            .find_by_id_for_update(&mut transaction, movie.id())
            .await?;
        assert_eq!(inside.map(|m| *m.number_in_stock()), Some(MovieStock::new(1)));
        let outside = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(outside.map(|m| *m.number_in_stock()), Some(MovieStock::new(2)));

        transaction.commit().await?;
        transaction.end_session().await?;
        let committed = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(committed.map(|m| *m.number_in_stock()), Some(MovieStock::new(1)));
        Ok(())
    }

    #[tokio::test]
    async fn delete_waits_for_the_row_lock() -> error_stack::Result<(), KernelError> {
        let db = MemoryDatabase::default();
        let movie = movie(1);
        db.movies.create(&movie).await?;

        let mut holder = db.transact(&TransactionOptions::default()).await?;
        db.movies.find_by_id_for_update(&mut holder, movie.id()).await?;

        let deleter = {
            let db = db.clone();
            let id = movie.id().clone();
            tokio::spawn(async move { db.movies.delete(&id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(db.movies.find_by_id(movie.id()).await?.is_some());

        holder.end_session().await?;
        deleter.await.expect("deleter panicked")?;
        assert!(db.movies.find_by_id(movie.id()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn decrement_is_guarded() -> error_stack::Result<(), KernelError> {
        let db = MemoryDatabase::default();
        let movie = movie(1);
        db.movies.create(&movie).await?;

        let mut transaction = db.transact(&TransactionOptions::default()).await?;
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
        transaction.roll_back().await?;
        transaction.end_session().await?;

        let found = db.movies.find_by_id(movie.id()).await?;
        assert_eq!(found.map(|m| *m.number_in_stock()), Some(MovieStock::new(1)));
        Ok(())
    }

    #[tokio::test]
    async fn row_lock_is_held_until_the_session_ends() -> error_stack::Result<(), KernelError> {
        let db = MemoryDatabase::default();
        let movie = movie(1);
        db.movies.create(&movie).await?;

        let mut holder = db.transact(&TransactionOptions::default()).await?;
        db.movies.find_by_id_for_update(&mut holder, movie.id()).await?;

        let waiter = {
            let db = db.clone();
            let id = movie.id().clone();
            tokio::spawn(async move {
                let mut transaction = db.transact(&TransactionOptions::default()).await?;
                let found = db.movies.find_by_id_for_update(&mut transaction, &id).await?;
                transaction.end_session().await?;
                Ok::<_, error_stack::Report<KernelError>>(found)
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        holder.end_session().await?;
        let found = waiter.await.expect("waiter panicked")?;
        assert_eq!(found, Some(movie));
        Ok(())
    }
}
