use crate::config::TransactionOptions;
use crate::KernelError;

#[async_trait::async_trait]
pub trait DatabaseConnection: 'static + Sync + Send {
    type Transaction: Transaction;
    async fn transact(
        &self,
        options: &TransactionOptions,
    ) -> error_stack::Result<Self::Transaction, KernelError>;
}

pub trait DependOnDatabaseConnection: 'static + Sync + Send {
    type DatabaseConnection: DatabaseConnection;
    fn database_connection(&self) -> &Self::DatabaseConnection;
}

impl<T> DependOnDatabaseConnection for T
where
    T: DatabaseConnection,
{
    type DatabaseConnection = T;
    fn database_connection(&self) -> &Self::DatabaseConnection {
        self
    }
}

/// A session with one open unit of work.
///
/// `commit` and `roll_back` finish the unit of work; `end_session` gives the
/// session back to the store and must be called exactly once on every path.
/// Dropping an unfinished transaction rolls it back.
#[async_trait::async_trait]
pub trait Transaction: 'static + Send {
    async fn commit(&mut self) -> error_stack::Result<(), KernelError>;
    async fn roll_back(&mut self) -> error_stack::Result<(), KernelError>;
    async fn end_session(self) -> error_stack::Result<(), KernelError>;
}
