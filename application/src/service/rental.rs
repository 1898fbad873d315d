use error_stack::Report;

use kernel::interface::config::{DependOnRentalConfig, TransactionOptions};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{
    CustomerQuery, DependOnCustomerQuery, DependOnMovieQuery, DependOnRentalQuery, MovieQuery,
    RentalQuery,
};
use kernel::interface::update::{
    DependOnMovieModifier, DependOnRentalModifier, MovieModifier, RentalModifier,
};
use kernel::prelude::entity::{Customer, CustomerId, MovieId, MovieStock, Rental, RentalId};
use kernel::{KernelError, Reference};

use crate::transfer::{CreateRentalDto, GetRentalDto, RentalDto};

#[async_trait::async_trait]
pub trait GetRentalService: 'static + Sync + Send + DependOnRentalQuery {
    async fn get_rental(
        &self,
        dto: GetRentalDto,
    ) -> error_stack::Result<Option<RentalDto>, KernelError> {
        let id = RentalId::new(dto.id);
        let rental = self.rental_query().find_by_id(&id).await?;
        Ok(rental.map(RentalDto::from))
    }

    async fn get_all_rentals(&self) -> error_stack::Result<Vec<RentalDto>, KernelError> {
        let rentals = self.rental_query().find_all().await?;
        Ok(rentals.into_iter().map(RentalDto::from).collect())
    }
}

impl<T> GetRentalService for T where T: DependOnRentalQuery {}

/// Checks out one copy of a movie.
///
/// Both references are resolved before a session is opened. The stock check,
/// the rental insert and the stock decrement then run in one unit of work that
/// is retried on write conflicts up to `max_attempts` times.
#[async_trait::async_trait]
pub trait CreateRentalService:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection
    + DependOnRentalConfig
    + DependOnCustomerQuery
    + DependOnMovieQuery
    + DependOnMovieModifier
    + DependOnRentalModifier
{
    async fn create_rental(
        &self,
        dto: CreateRentalDto,
    ) -> error_stack::Result<RentalDto, KernelError> {
        let customer_id = CustomerId::new(dto.customer_id);
        let movie_id = MovieId::new(dto.movie_id);

        let customer = self
            .customer_query()
            .find_by_id(&customer_id)
            .await?
            .ok_or_else(|| {
                Report::new(KernelError::InvalidReference(Reference::Customer))
                    .attach_printable(format!("Customer {} not found", dto.customer_id))
            })?;
        if self.movie_query().find_by_id(&movie_id).await?.is_none() {
            return Err(invalid_movie(&movie_id));
        }

        let config = self.rental_config();
        let max_attempts = *config.max_attempts();
        let mut attempt = 1;
        loop {
            match rent_once(self, &customer, &movie_id, config.options()).await {
                Ok(rental) => {
                    tracing::info!(
                        "Rental {} created for customer {} and movie {}",
                        rental.id().as_ref(),
                        dto.customer_id,
                        dto.movie_id
                    );
                    return Ok(RentalDto::from(rental));
                }
                Err(report)
                    if matches!(report.current_context(), KernelError::Concurrency)
                        && attempt < max_attempts =>
                {
                    tracing::warn!(
                        "Rental attempt {attempt}/{max_attempts} conflicted, retrying: {report:?}"
                    );
                    attempt += 1;
                }
                Err(report) => {
                    tracing::info!(
                        "Rental of movie {} for customer {} failed: {}",
                        dto.movie_id,
                        dto.customer_id,
                        report.current_context()
                    );
                    return Err(report);
                }
            }
        }
    }
}

impl<T> CreateRentalService for T where
    T: DependOnDatabaseConnection
        + DependOnRentalConfig
        + DependOnCustomerQuery
        + DependOnMovieQuery
        + DependOnMovieModifier
        + DependOnRentalModifier
{
}

fn invalid_movie(id: &MovieId) -> Report<KernelError> {
    Report::new(KernelError::InvalidReference(Reference::Movie))
        .attach_printable(format!("Movie {} not found", id.as_ref()))
}

/// One unit of work. The session is ended on every path; a failure to end it
/// is logged and never replaces the outcome.
async fn rent_once<T>(
    service: &T,
    customer: &Customer,
    movie_id: &MovieId,
    options: &TransactionOptions,
) -> error_stack::Result<Rental, KernelError>
where
    T: ?Sized
        + DependOnDatabaseConnection
        + DependOnMovieQuery
        + DependOnMovieModifier
        + DependOnRentalModifier,
{
    let mut transaction = service.database_connection().transact(options).await?;

    let staged = tokio::time::timeout(
        *options.timeout(),
        stage_rental(service, &mut transaction, customer, movie_id),
    )
    .await
    .unwrap_or_else(|elapsed| {
        Err(Report::new(elapsed)
            .change_context(KernelError::Timeout)
            .attach_printable(format!("Rental of movie {} timed out", movie_id.as_ref())))
    });

    let result = match staged {
        Ok(rental) => match transaction.commit().await {
            Ok(()) => Ok(rental),
            Err(report) => {
                abort(&mut transaction).await;
                Err(report)
            }
        },
        Err(report) => {
            abort(&mut transaction).await;
            Err(report)
        }
    };

    if let Err(report) = transaction.end_session().await {
        tracing::warn!("Failed to end session: {report:?}");
    }
    result
}

async fn stage_rental<T>(
    service: &T,
    con: &mut <T::DatabaseConnection as DatabaseConnection>::Transaction,
    customer: &Customer,
    movie_id: &MovieId,
) -> error_stack::Result<Rental, KernelError>
where
    T: ?Sized
        + DependOnDatabaseConnection
        + DependOnMovieQuery
        + DependOnMovieModifier
        + DependOnRentalModifier,
{
    let movie = service
        .movie_query()
        .find_by_id_for_update(con, movie_id)
        .await?
        .ok_or_else(|| invalid_movie(movie_id))?;
    if movie.number_in_stock().is_empty() {
        return Err(Report::new(KernelError::OutOfStock)
            .attach_printable(format!("Movie {} has no copies left", movie_id.as_ref())));
    }

    let rental = Rental::create(customer, &movie);
    service.rental_modifier().create(con, &rental).await?;

    let update = service
        .movie_modifier()
        .decrement_stock(con, movie_id, &MovieStock::new(1))
        .await?;
    if !*update.modified() {
        return Err(Report::new(KernelError::OutOfStock)
            .attach_printable(format!("Stock of movie {} changed concurrently", movie_id.as_ref())));
    }
    Ok(rental)
}

async fn abort<C: Transaction>(con: &mut C) {
    if let Err(report) = con.roll_back().await {
        tracing::warn!("Failed to abort transaction: {report:?}");
    }
}
