use crate::error::ClanTuneError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), ClanTuneError>;
}

/// Wraps a strategy construction error with the section it came from.
pub(crate) fn section_error<S: ConfigSection>(error: ClanTuneError) -> ClanTuneError {
    ClanTuneError::Configuration(format!("[{}] {}", S::section_name(), error))
}
