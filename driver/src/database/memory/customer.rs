use std::sync::Arc;

use kernel::interface::query::CustomerQuery;
use kernel::interface::update::CustomerModifier;
use kernel::prelude::entity::{Customer, CustomerId};
use kernel::KernelError;

use crate::database::memory::MemoryStore;

#[derive(Clone)]
pub struct MemoryCustomerRepository {
    store: Arc<MemoryStore>,
}

impl MemoryCustomerRepository {
    pub(in crate::database) fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl CustomerQuery for MemoryCustomerRepository {
    async fn find_by_id(
        &self,
        id: &CustomerId,
    ) -> error_stack::Result<Option<Customer>, KernelError> {
        let collections = self.store.collections.read().await;
        Ok(collections.customers.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl CustomerModifier for MemoryCustomerRepository {
    async fn create(&self, customer: &Customer) -> error_stack::Result<(), KernelError> {
        let mut collections = self.store.collections.write().await;
        collections
            .customers
            .insert(customer.id().clone(), customer.clone());
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> error_stack::Result<(), KernelError> {
        let mut collections = self.store.collections.write().await;
        if let Some(stored) = collections.customers.get_mut(customer.id()) {
            *stored = customer.clone();
        }
        Ok(())
    }
}
