//! Error types for deferstack

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for deferstack
#[derive(Error, Debug)]
pub enum Error {
    /// A scheduler was configured with a capacity that cannot run anything.
    #[error("invalid capacity {0}: the nesting bound must be at least 1")]
    InvalidCapacity(usize),

    /// A caller passed a start level outside the positive integers while
    /// strict contract checks were enabled.
    #[error("invalid start level {0}: expected a positive integer")]
    InvalidStartLevel(usize),

    /// A scheduled callback failed. The scheduler was reset to idle before
    /// this error was returned, and any work still queued in the window was
    /// discarded.
    ///
    /// Whatever the callback returned is kept as-is, including a
    /// `deferstack::Error` of another kind (a strict start-level rejection
    /// forwarded with `?`, or the callback's own `DeferConfig::load`
    /// failure); reach it with `as_callback()?.downcast_ref::<Error>()`.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a callback failure. A `Callback` error forwarded from a nested
    /// `schedule` call is flattened rather than wrapped twice; every other
    /// error stays a callback failure.
    pub(crate) fn from_callback(err: anyhow::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(Self::Callback(inner)) => Self::Callback(inner),
            Ok(other) => Self::Callback(other.into()),
            Err(err) => Self::Callback(err),
        }
    }

    /// Returns the underlying callback failure, if this error carries one.
    #[must_use]
    pub fn as_callback(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Callback(err) => Some(err),
            _ => None,
        }
    }

    /// True for errors caused by how the scheduler was called or configured,
    /// as opposed to failures raised by user work.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidCapacity(_) | Self::InvalidStartLevel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_capacity_display() {
        let err = Error::InvalidCapacity(0);
        assert_eq!(
            err.to_string(),
            "invalid capacity 0: the nesting bound must be at least 1"
        );
        assert!(err.is_contract_violation());
    }

    #[test]
    fn invalid_start_level_display() {
        let err = Error::InvalidStartLevel(0);
        assert!(err.to_string().contains("positive integer"));
        assert!(err.is_contract_violation());
        assert!(err.as_callback().is_none());
    }

    #[test]
    fn callback_error_is_transparent() {
        let err = Error::from(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_contract_violation());
        assert_eq!(err.as_callback().map(ToString::to_string), Some("boom".to_string()));
    }

    #[test]
    fn forwarded_callback_error_is_flattened() {
        let forwarded = anyhow::Error::from(Error::Callback(anyhow::anyhow!("plain")));
        let err = Error::from_callback(forwarded);
        let inner = err.as_callback().unwrap();
        assert!(inner.downcast_ref::<Error>().is_none());
        assert_eq!(inner.to_string(), "plain");
    }

    #[test]
    fn callbacks_own_config_error_is_not_reclassified() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from_callback(anyhow::Error::from(Error::Io(io)));
        assert!(!err.is_contract_violation());
        let inner = err.as_callback().unwrap();
        assert!(matches!(inner.downcast_ref::<Error>(), Some(Error::Io(_))));
        assert!(err.to_string().contains("failed to read configuration"));
    }

    #[test]
    fn config_error_wraps_toml() {
        let parse_err = toml::from_str::<toml::Value>("capacity = ").unwrap_err();
        let err = Error::from(parse_err);
        assert!(err.to_string().starts_with("failed to parse configuration"));
    }
}
