use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{Movie, MovieId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait MovieQuery: 'static + Sync + Send {
    type Transaction: Transaction;
    async fn find_by_id(&self, id: &MovieId) -> error_stack::Result<Option<Movie>, KernelError>;

    /// Reads the movie inside `con` and holds its row lock until the unit of
    /// work finishes.
    async fn find_by_id_for_update(
        &self,
        con: &mut Self::Transaction,
        id: &MovieId,
    ) -> error_stack::Result<Option<Movie>, KernelError>;
}

pub trait DependOnMovieQuery: 'static + Sync + Send + DependOnDatabaseConnection {
    type MovieQuery: MovieQuery<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn movie_query(&self) -> &Self::MovieQuery;
}
