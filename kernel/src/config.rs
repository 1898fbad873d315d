use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use destructure::Mutation;
use error_stack::Report;
use serde::{Deserialize, Serialize};
use vodca::References;

use crate::KernelError;

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPreference {
    #[default]
    Primary,
    Secondary,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConcern {
    #[default]
    Local,
    Majority,
    Linearizable,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteConcern {
    #[default]
    Majority,
    All,
    Acknowledged,
}

impl FromStr for ReadPreference {
    type Err = Report<KernelError>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            _ => Err(unknown_option("read preference", s)),
        }
    }
}

impl FromStr for ReadConcern {
    type Err = Report<KernelError>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "local" => Ok(Self::Local),
            "majority" => Ok(Self::Majority),
            "linearizable" => Ok(Self::Linearizable),
            _ => Err(unknown_option("read concern", s)),
        }
    }
}

impl FromStr for WriteConcern {
    type Err = Report<KernelError>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "majority" => Ok(Self::Majority),
            "all" => Ok(Self::All),
            "acknowledged" => Ok(Self::Acknowledged),
            _ => Err(unknown_option("write concern", s)),
        }
    }
}

fn unknown_option(kind: &str, value: &str) -> Report<KernelError> {
    Report::new(KernelError::Internal).attach_printable(format!("Unknown {kind}: {value}"))
}

impl Display for ReadPreference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadPreference::Primary => write!(f, "primary"),
            ReadPreference::Secondary => write!(f, "secondary"),
        }
    }
}

/// Options a unit of work is opened with.
#[derive(Debug, Clone, Eq, PartialEq, References, Mutation)]
pub struct TransactionOptions {
    read_preference: ReadPreference,
    read_concern: ReadConcern,
    write_concern: WriteConcern,
    timeout: Duration,
}

impl TransactionOptions {
    pub fn new(
        read_preference: ReadPreference,
        read_concern: ReadConcern,
        write_concern: WriteConcern,
        timeout: Duration,
    ) -> Self {
        Self {
            read_preference,
            read_concern,
            write_concern,
            timeout,
        }
    }

    /// A unit of work that writes has to read from the primary.
    pub fn ensure_primary(&self) -> error_stack::Result<(), KernelError> {
        match self.read_preference {
            ReadPreference::Primary => Ok(()),
            other => Err(Report::new(KernelError::Internal).attach_printable(format!(
                "Read preference in a transaction must be primary, got {other}"
            ))),
        }
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            read_preference: ReadPreference::default(),
            read_concern: ReadConcern::default(),
            write_concern: WriteConcern::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, References, Mutation)]
pub struct RentalConfig {
    options: TransactionOptions,
    max_attempts: u32,
}

impl RentalConfig {
    pub fn new(options: TransactionOptions, max_attempts: u32) -> Self {
        Self {
            options,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            options: TransactionOptions::default(),
            max_attempts: 3,
        }
    }
}

pub trait DependOnRentalConfig: 'static + Sync + Send {
    fn rental_config(&self) -> &RentalConfig;
}
