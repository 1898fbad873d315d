use std::fmt::Display;

use error_stack::Context;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Reference {
    Customer,
    Movie,
}

#[derive(Debug)]
pub enum KernelError {
    InvalidReference(Reference),
    OutOfStock,
    Concurrency,
    Timeout,
    Internal,
}

impl KernelError {
    /// Caller mistakes that leave the store untouched and may be fixed by changing the input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, KernelError::InvalidReference(_) | KernelError::OutOfStock)
    }

    /// Infrastructure failures of a unit of work. Nothing was persisted, so the
    /// whole call is safe to repeat.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            KernelError::Concurrency | KernelError::Timeout | KernelError::Internal
        )
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::InvalidReference(Reference::Customer) => write!(f, "Invalid customer."),
            KernelError::InvalidReference(Reference::Movie) => write!(f, "Invalid movie."),
            KernelError::OutOfStock => write!(f, "Movie not in stock."),
            KernelError::Concurrency => write!(f, "Concurrency error"),
            KernelError::Timeout => write!(f, "Process timed out"),
            KernelError::Internal => write!(f, "Internal kernel error"),
        }
    }
}

impl Context for KernelError {}

#[cfg(test)]
mod test {
    use crate::{KernelError, Reference};

    #[test]
    fn classification() {
        assert!(KernelError::InvalidReference(Reference::Movie).is_client_error());
        assert!(KernelError::OutOfStock.is_client_error());
        assert!(!KernelError::OutOfStock.is_transaction_failure());
        for error in [
            KernelError::Concurrency,
            KernelError::Timeout,
            KernelError::Internal,
        ] {
            assert!(error.is_transaction_failure());
            assert!(!error.is_client_error());
        }
    }

    #[test]
    fn messages() {
        assert_eq!(
            KernelError::InvalidReference(Reference::Customer).to_string(),
            "Invalid customer."
        );
        assert_eq!(
            KernelError::InvalidReference(Reference::Movie).to_string(),
            "Invalid movie."
        );
        assert_eq!(KernelError::OutOfStock.to_string(), "Movie not in stock.");
    }
}
