use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Fromln, AsRefln)]
pub struct RentalFee(Decimal);

impl RentalFee {
    pub fn new(fee: impl Into<Decimal>) -> Self {
        Self(fee.into())
    }
}
