//! Error types for metacache.
//!
//! Container operations themselves never fail: absence is an `Option::None`,
//! capacity is enforced by eviction, and the priority queue reports admission
//! with a `bool`. Errors only arise in two places:
//!
//! - [`ConfigError`]: a fallible constructor received parameters it cannot
//!   honor (zero capacity, ratio outside `[0.0, 1.0]`, zero reclamation
//!   interval, no Tokio runtime to host the TTL reclamation task).
//! - [`InvariantError`]: a `check_invariants` walk found the ordering
//!   structure and its side index out of sync.
//!
//! ## Example Usage
//!
//! ```
//! use metacache::error::ConfigError;
//! use metacache::policy::two_q::TwoQCache;
//!
//! let cache: Result<TwoQCache<u64, String>, ConfigError> =
//!     TwoQCache::try_with_ratios(128, 0.25, 0.5);
//! assert!(cache.is_ok());
//!
//! let bad = TwoQCache::<u64, String>::try_with_ratios(128, 1.5, 0.5);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when a container's index and ordering structure disagree.
///
/// Produced by `check_invariants` on every container
/// (e.g. [`LruCache::check_invariants`](crate::policy::lru::LruCache::check_invariants)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when container configuration parameters are invalid.
///
/// # Example
///
/// ```
/// use metacache::policy::lru::LruCache;
///
/// let err = LruCache::<u64, u64>::try_new(0).unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Validates a segment ratio, shared by the constructors that take one.
pub(crate) fn check_ratio(name: &str, ratio: f64) -> Result<(), ConfigError> {
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::new(format!(
            "{} must be in [0.0, 1.0], got {}",
            name, ratio
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
