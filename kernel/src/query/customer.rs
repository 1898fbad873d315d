use crate::entity::{Customer, CustomerId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait CustomerQuery: 'static + Sync + Send {
    async fn find_by_id(
        &self,
        id: &CustomerId,
    ) -> error_stack::Result<Option<Customer>, KernelError>;
}

pub trait DependOnCustomerQuery: 'static + Sync + Send {
    type CustomerQuery: CustomerQuery;
    fn customer_query(&self) -> &Self::CustomerQuery;
}
