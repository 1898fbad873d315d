mod id;
mod rate;
mod stock;
mod title;

pub use self::{id::*, rate::*, stock::*, title::*};
use destructure::{Destructure, Mutation};
use serde::{Deserialize, Serialize};
use vodca::References;

#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation,
)]
pub struct Movie {
    id: MovieId,
    title: MovieTitle,
    number_in_stock: MovieStock,
    daily_rental_rate: DailyRentalRate,
}

impl Movie {
    pub fn new(
        id: MovieId,
        title: MovieTitle,
        number_in_stock: MovieStock,
        daily_rental_rate: DailyRentalRate,
    ) -> Self {
        Self {
            id,
            title,
            number_in_stock,
            daily_rental_rate,
        }
    }
}
