use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use error_stack::Report;
use tokio::sync::{OwnedMutexGuard, RwLock};

use kernel::interface::config::{DependOnRentalConfig, RentalConfig, TransactionOptions};
use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::query::{DependOnCustomerQuery, DependOnMovieQuery, DependOnRentalQuery};
use kernel::interface::update::{
    DependOnCustomerModifier, DependOnMovieModifier, DependOnRentalModifier,
};
use kernel::prelude::entity::{
    Customer, CustomerId, Movie, MovieId, MovieStock, Rental, RentalId,
};
use kernel::KernelError;

pub use self::{customer::*, movie::*, rental::*};

mod customer;
mod movie;
mod rental;

/// Failures the in-memory store can be told to produce. Each injected fault
/// fires once, at the first operation it applies to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Fault {
    /// The stock decrement fails after the rental insert was staged.
    DecrementFailure,
    /// Commit detects a write conflict.
    CommitConflict,
    /// Commit cannot be acknowledged (e.g. write concern not satisfied).
    CommitFailure,
    /// Ending the session reports an error after releasing everything.
    ReleaseFailure,
}

#[derive(Default)]
pub(in crate::database) struct Collections {
    customers: HashMap<CustomerId, Customer>,
    movies: HashMap<MovieId, Movie>,
    rentals: HashMap<RentalId, Rental>,
}

#[derive(Default)]
pub(in crate::database) struct MemoryStore {
    collections: RwLock<Collections>,
    row_locks: Mutex<HashMap<MovieId, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Vec<Fault>>,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl MemoryStore {
    fn row_lock(&self, id: &MovieId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.clone()).or_default().clone()
    }

    /// Forgets row locks nobody holds or waits for.
    fn prune_row_locks<'a>(&self, ids: impl IntoIterator<Item = &'a MovieId>) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.iter().position(|injected| *injected == fault) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Process-local store. Movie rows are locked for the lifetime of the unit of
/// work that touched them, and staged writes become visible all at once on
/// commit.
#[derive(Clone)]
pub struct MemoryDatabase {
    store: Arc<MemoryStore>,
    config: RentalConfig,
    customers: MemoryCustomerRepository,
    movies: MemoryMovieRepository,
    rentals: MemoryRentalRepository,
}

impl MemoryDatabase {
    pub fn new(config: RentalConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            customers: MemoryCustomerRepository::new(store.clone()),
            movies: MemoryMovieRepository::new(store.clone()),
            rentals: MemoryRentalRepository::new(store.clone()),
            store,
            config,
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.store
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault);
    }

    pub fn opened_sessions(&self) -> usize {
        self.store.opened.load(Ordering::SeqCst)
    }

    pub fn released_sessions(&self) -> usize {
        self.store.released.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new(RentalConfig::default())
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for MemoryDatabase {
    type Transaction = MemoryTransaction;
    async fn transact(
        &self,
        options: &TransactionOptions,
    ) -> error_stack::Result<Self::Transaction, KernelError> {
        options.ensure_primary()?;
        self.store.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTransaction::new(self.store.clone()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum SessionState {
    Active,
    Committed,
    Aborted,
}

pub struct MemoryTransaction {
    store: Arc<MemoryStore>,
    state: SessionState,
    locks: HashMap<MovieId, OwnedMutexGuard<()>>,
    rentals: Vec<Rental>,
    stock: HashMap<MovieId, MovieStock>,
    ended: bool,
}

impl MemoryTransaction {
    fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            state: SessionState::Active,
            locks: HashMap::new(),
            rentals: Vec::new(),
            stock: HashMap::new(),
            ended: false,
        }
    }

    pub(in crate::database) fn ensure_active(&self) -> error_stack::Result<(), KernelError> {
        match self.state {
            SessionState::Active => Ok(()),
            state => Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Transaction already finished: {state:?}"))),
        }
    }

    pub(in crate::database) async fn lock(&mut self, id: &MovieId) {
        if !self.locks.contains_key(id) {
            let guard = self.store.row_lock(id).lock_owned().await;
            self.locks.insert(id.clone(), guard);
        }
    }

    /// Committed movie with this transaction's pending stock applied.
    pub(in crate::database) async fn read_movie(&self, id: &MovieId) -> Option<Movie> {
        let collections = self.store.collections.read().await;
        let mut movie = collections.movies.get(id).cloned()?;
        if let Some(stock) = self.stock.get(id) {
            movie.substitute(|movie| *movie.number_in_stock = *stock);
        }
        Some(movie)
    }

    pub(in crate::database) fn stage_stock(&mut self, id: &MovieId, stock: MovieStock) {
        self.stock.insert(id.clone(), stock);
    }

    pub(in crate::database) fn stage_rental(&mut self, rental: Rental) {
        self.rentals.push(rental);
    }

    fn release_locks(&mut self) {
        let ids = self.locks.drain().map(|(id, _)| id).collect::<Vec<_>>();
        self.store.prune_row_locks(&ids);
    }

    fn discard(&mut self) {
        self.rentals.clear();
        self.stock.clear();
        self.release_locks();
    }

    fn abort_with(&mut self, report: Report<KernelError>) -> error_stack::Result<(), KernelError> {
        self.discard();
        self.state = SessionState::Aborted;
        Err(report)
    }
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(&mut self) -> error_stack::Result<(), KernelError> {
        self.ensure_active()?;
        if self.store.take_fault(Fault::CommitConflict) {
            return self.abort_with(
                Report::new(KernelError::Concurrency).attach_printable("Write conflict on commit"),
            );
        }
        if self.store.take_fault(Fault::CommitFailure) {
            return self.abort_with(
                Report::new(KernelError::Internal).attach_printable("Write concern not satisfied"),
            );
        }
        {
            let mut collections = self.store.collections.write().await;
            for (id, stock) in self.stock.drain() {
                if let Some(movie) = collections.movies.get_mut(&id) {
                    movie.substitute(|movie| *movie.number_in_stock = stock);
                }
            }
            for rental in self.rentals.drain(..) {
                collections.rentals.insert(rental.id().clone(), rental);
            }
        }
        self.release_locks();
        self.state = SessionState::Committed;
        Ok(())
    }

    async fn roll_back(&mut self) -> error_stack::Result<(), KernelError> {
        match self.state {
            SessionState::Committed => Err(Report::new(KernelError::Internal)
                .attach_printable("Cannot roll back a committed transaction")),
            _ => {
                self.discard();
                self.state = SessionState::Aborted;
                Ok(())
            }
        }
    }

    async fn end_session(mut self) -> error_stack::Result<(), KernelError> {
        if self.state == SessionState::Active {
            self.discard();
            self.state = SessionState::Aborted;
        }
        self.ended = true;
        self.store.released.fetch_add(1, Ordering::SeqCst);
        if self.store.take_fault(Fault::ReleaseFailure) {
            return Err(
                Report::new(KernelError::Internal).attach_printable("Failed to end the session")
            );
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        // dropped without end_session, e.g. the caller went away mid-flight
        if !self.ended {
            self.release_locks();
            self.store.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl DependOnRentalConfig for MemoryDatabase {
    fn rental_config(&self) -> &RentalConfig {
        &self.config
    }
}

impl DependOnCustomerQuery for MemoryDatabase {
    type CustomerQuery = MemoryCustomerRepository;
    fn customer_query(&self) -> &Self::CustomerQuery {
        &self.customers
    }
}

impl DependOnCustomerModifier for MemoryDatabase {
    type CustomerModifier = MemoryCustomerRepository;
    fn customer_modifier(&self) -> &Self::CustomerModifier {
        &self.customers
    }
}

impl DependOnMovieQuery for MemoryDatabase {
    type MovieQuery = MemoryMovieRepository;
    fn movie_query(&self) -> &Self::MovieQuery {
        &self.movies
    }
}

impl DependOnMovieModifier for MemoryDatabase {
    type MovieModifier = MemoryMovieRepository;
    fn movie_modifier(&self) -> &Self::MovieModifier {
        &self.movies
    }
}

impl DependOnRentalQuery for MemoryDatabase {
    type RentalQuery = MemoryRentalRepository;
    fn rental_query(&self) -> &Self::RentalQuery {
        &self.rentals
    }
}

impl DependOnRentalModifier for MemoryDatabase {
    type RentalModifier = MemoryRentalRepository;
    fn rental_modifier(&self) -> &Self::RentalModifier {
        &self.rentals
    }
}
