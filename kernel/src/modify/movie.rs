use vodca::References;

use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{Movie, MovieId, MovieStock};
use crate::KernelError;

/// Outcome of a guarded stock decrement. `matched` is false when the movie
/// does not exist, `modified` is false when it exists but lacks stock.
#[derive(Debug, Clone, Copy, Eq, PartialEq, References)]
pub struct StockUpdate {
    matched: bool,
    modified: bool,
}

impl StockUpdate {
    pub fn new(matched: bool, modified: bool) -> Self {
        Self { matched, modified }
    }
}

#[async_trait::async_trait]
pub trait MovieModifier: 'static + Sync + Send {
    type Transaction: Transaction;
    async fn create(&self, movie: &Movie) -> error_stack::Result<(), KernelError>;
    async fn update(&self, movie: &Movie) -> error_stack::Result<(), KernelError>;
    async fn delete(&self, id: &MovieId) -> error_stack::Result<(), KernelError>;
    async fn decrement_stock(
        &self,
        con: &mut Self::Transaction,
        id: &MovieId,
        amount: &MovieStock,
    ) -> error_stack::Result<StockUpdate, KernelError>;
}

pub trait DependOnMovieModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type MovieModifier: MovieModifier<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn movie_modifier(&self) -> &Self::MovieModifier;
}
