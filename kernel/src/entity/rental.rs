mod date;
mod fee;
mod id;
mod snapshot;

pub use self::{date::*, fee::*, id::*, snapshot::*};
use destructure::Destructure;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vodca::References;

use crate::entity::{Customer, Movie};

/// One checkout. The snapshots are copies taken when the rental was created
/// and never follow later edits of the customer or the movie.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure)]
pub struct Rental {
    id: RentalId,
    customer: CustomerSnapshot,
    movie: MovieSnapshot,
    date_out: DateOut,
    date_returned: Option<DateReturned>,
    rental_fee: Option<RentalFee>,
}

impl Rental {
    pub fn new(
        id: RentalId,
        customer: CustomerSnapshot,
        movie: MovieSnapshot,
        date_out: DateOut,
        date_returned: Option<DateReturned>,
        rental_fee: Option<RentalFee>,
    ) -> Self {
        Self {
            id,
            customer,
            movie,
            date_out,
            date_returned,
            rental_fee,
        }
    }

    pub fn create(customer: &Customer, movie: &Movie) -> Self {
        Self {
            id: RentalId::new(Uuid::new_v4()),
            customer: CustomerSnapshot::from(customer),
            movie: MovieSnapshot::from(movie),
            date_out: DateOut::now(),
            date_returned: None,
            rental_fee: None,
        }
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::entity::{
        Customer, CustomerId, CustomerIsGold, CustomerName, CustomerPhone, DailyRentalRate,
        Movie, MovieId, MovieStock, MovieTitle, Rental,
    };

    #[test]
    fn create_copies_snapshots() {
        let customer = Customer::new(
            CustomerId::new(Uuid::new_v4()),
            CustomerName::new("Mosh"),
            CustomerPhone::new("12345"),
            CustomerIsGold::new(true),
        );
        let movie = Movie::new(
            MovieId::new(Uuid::new_v4()),
            MovieTitle::new("Terminator"),
            MovieStock::new(3),
            DailyRentalRate::new(dec!(2.5)),
        );

        let rental = Rental::create(&customer, &movie);

        assert_eq!(rental.customer().id(), customer.id());
        assert_eq!(rental.customer().name(), customer.name());
        assert_eq!(rental.customer().phone(), customer.phone());
        assert_eq!(rental.movie().id(), movie.id());
        assert_eq!(rental.movie().title(), movie.title());
        assert_eq!(rental.movie().daily_rental_rate(), movie.daily_rental_rate());
        assert!(rental.date_returned().is_none());
        assert!(rental.rental_fee().is_none());

        let customer = customer.reconstruct(|c| c.name = CustomerName::new("Renamed"));
        assert_eq!(rental.customer().name(), &CustomerName::new("Mosh"));
        assert_ne!(rental.customer().name(), customer.name());
    }
}
