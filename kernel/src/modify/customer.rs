use crate::entity::Customer;
use crate::KernelError;

#[async_trait::async_trait]
pub trait CustomerModifier: 'static + Sync + Send {
    async fn create(&self, customer: &Customer) -> error_stack::Result<(), KernelError>;
    async fn update(&self, customer: &Customer) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnCustomerModifier: 'static + Sync + Send {
    type CustomerModifier: CustomerModifier;
    fn customer_modifier(&self) -> &Self::CustomerModifier;
}
