use std::sync::Arc;

use kernel::interface::query::RentalQuery;
use kernel::interface::update::RentalModifier;
use kernel::prelude::entity::{Rental, RentalId};
use kernel::KernelError;

use crate::database::memory::{MemoryStore, MemoryTransaction};

#[derive(Clone)]
pub struct MemoryRentalRepository {
    store: Arc<MemoryStore>,
}

impl MemoryRentalRepository {
    pub(in crate::database) fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl RentalQuery for MemoryRentalRepository {
    async fn find_by_id(
        &self,
        id: &RentalId,
    ) -> error_stack::Result<Option<Rental>, KernelError> {
        let collections = self.store.collections.read().await;
        Ok(collections.rentals.get(id).cloned())
    }

    async fn find_all(&self) -> error_stack::Result<Vec<Rental>, KernelError> {
        let collections = self.store.collections.read().await;
        let mut rentals = collections.rentals.values().cloned().collect::<Vec<_>>();
        rentals.sort_by(|a, b| b.date_out().cmp(a.date_out()));
        Ok(rentals)
    }
}

#[async_trait::async_trait]
impl RentalModifier for MemoryRentalRepository {
    type Transaction = MemoryTransaction;

    async fn create(
        &self,
        con: &mut MemoryTransaction,
        rental: &Rental,
    ) -> error_stack::Result<(), KernelError> {
        con.ensure_active()?;
        con.stage_rental(rental.clone());
        Ok(())
    }
}
