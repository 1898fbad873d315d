use crate::entity::{Rental, RentalId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait RentalQuery: 'static + Sync + Send {
    async fn find_by_id(&self, id: &RentalId)
        -> error_stack::Result<Option<Rental>, KernelError>;

    /// Newest first.
    async fn find_all(&self) -> error_stack::Result<Vec<Rental>, KernelError>;
}

pub trait DependOnRentalQuery: 'static + Sync + Send {
    type RentalQuery: RentalQuery;
    fn rental_query(&self) -> &Self::RentalQuery;
}
