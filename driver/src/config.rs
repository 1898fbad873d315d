use std::time::Duration;

use error_stack::ResultExt;
use kernel::interface::config::{
    ReadConcern, ReadPreference, RentalConfig, TransactionOptions, WriteConcern,
};
use kernel::KernelError;

const RENTAL_READ_PREFERENCE: &str = "RENTAL_READ_PREFERENCE";
const RENTAL_READ_CONCERN: &str = "RENTAL_READ_CONCERN";
const RENTAL_WRITE_CONCERN: &str = "RENTAL_WRITE_CONCERN";
const RENTAL_TRANSACTION_TIMEOUT_MS: &str = "RENTAL_TRANSACTION_TIMEOUT_MS";
const RENTAL_MAX_ATTEMPTS: &str = "RENTAL_MAX_ATTEMPTS";

/// Reads the rental settings from the environment (and `.env`). Unset
/// variables keep their defaults.
pub fn load_rental_config() -> error_stack::Result<RentalConfig, KernelError> {
    load_rental_config_from(|key| dotenvy::var(key).ok())
}

pub(crate) fn load_rental_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> error_stack::Result<RentalConfig, KernelError> {
    let defaults = RentalConfig::default();
    let options = defaults.options();

    let read_preference = lookup(RENTAL_READ_PREFERENCE)
        .map(|value| value.parse::<ReadPreference>())
        .transpose()?
        .unwrap_or(*options.read_preference());
    let read_concern = lookup(RENTAL_READ_CONCERN)
        .map(|value| value.parse::<ReadConcern>())
        .transpose()?
        .unwrap_or(*options.read_concern());
    let write_concern = lookup(RENTAL_WRITE_CONCERN)
        .map(|value| value.parse::<WriteConcern>())
        .transpose()?
        .unwrap_or(*options.write_concern());
    let timeout = lookup(RENTAL_TRANSACTION_TIMEOUT_MS)
        .map(|value| value.parse::<u64>())
        .transpose()
        .change_context_lazy(|| KernelError::Internal)
        .attach_printable_lazy(|| format!("{RENTAL_TRANSACTION_TIMEOUT_MS} must be milliseconds"))?
        .map_or(*options.timeout(), Duration::from_millis);
    let max_attempts = lookup(RENTAL_MAX_ATTEMPTS)
        .map(|value| value.parse::<u32>())
        .transpose()
        .change_context_lazy(|| KernelError::Internal)
        .attach_printable_lazy(|| format!("{RENTAL_MAX_ATTEMPTS} must be a positive number"))?
        .unwrap_or(*defaults.max_attempts());

    Ok(RentalConfig::new(
        TransactionOptions::new(read_preference, read_concern, write_concern, timeout),
        max_attempts,
    ))
}
