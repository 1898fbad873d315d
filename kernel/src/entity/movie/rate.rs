use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Fromln, AsRefln)]
pub struct DailyRentalRate(Decimal);

impl DailyRentalRate {
    pub fn new(rate: impl Into<Decimal>) -> Self {
        Self(rate.into())
    }
}
