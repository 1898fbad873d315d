use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Fromln, AsRefln)]
pub struct MovieStock(i32);

impl MovieStock {
    pub fn new(amount: impl Into<i32>) -> Self {
        Self(amount.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0 <= 0
    }

    /// Remaining stock after taking `amount`, or `None` if there is not enough.
    pub fn checked_take(&self, amount: &MovieStock) -> Option<MovieStock> {
        self.0
            .checked_sub(amount.0)
            .filter(|rest| *rest >= 0)
            .map(MovieStock)
    }
}

#[cfg(test)]
mod test {
    use crate::entity::MovieStock;

    #[test]
    fn take() {
        let stock = MovieStock::new(2);
        assert_eq!(stock.checked_take(&MovieStock::new(1)), Some(MovieStock::new(1)));
        assert_eq!(stock.checked_take(&MovieStock::new(2)), Some(MovieStock::new(0)));
        assert_eq!(stock.checked_take(&MovieStock::new(3)), None);
        assert!(MovieStock::new(0).is_empty());
        assert!(!stock.is_empty());
    }
}
