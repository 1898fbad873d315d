mod id;
mod is_gold;
mod name;
mod phone;

pub use self::{id::*, is_gold::*, name::*, phone::*};
use destructure::{Destructure, Mutation};
use serde::{Deserialize, Serialize};
use vodca::References;

#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation,
)]
pub struct Customer {
    id: CustomerId,
    name: CustomerName,
    phone: CustomerPhone,
    is_gold: CustomerIsGold,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: CustomerName,
        phone: CustomerPhone,
        is_gold: CustomerIsGold,
    ) -> Self {
        Self {
            id,
            name,
            phone,
            is_gold,
        }
    }
}
