use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Default, Clone, Eq, PartialEq, Fromln, AsRefln, Serialize, Deserialize)]
pub struct CustomerIsGold(bool);

impl CustomerIsGold {
    pub fn new(value: impl Into<bool>) -> Self {
        Self(value.into())
    }
}
