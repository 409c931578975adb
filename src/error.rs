//! Error types for the agekit library.
//!
//! The containers encode nearly every outcome in return values: unique
//! insertion signals an occupied key as `(EntryId, false)`, removals return
//! counts or `Option`s, and lookups return `Option`s. The one keyed
//! operation with a hard contract is `at`, which promises a value and fails
//! with [`KeyNotFoundError`] when the key has no entry.

use std::fmt;

/// Error returned by `at`/`at_mut` when the key has no equivalent entry.
///
/// The container is left untouched by the failed access.
///
/// # Example
///
/// ```
/// use agekit::clock::ManualClock;
/// use agekit::ordered::AgedOrderedMap;
///
/// let mut map: AgedOrderedMap<u32, &str, ManualClock> =
///     AgedOrderedMap::new(ManualClock::new());
/// map.insert(1, "one");
///
/// assert!(map.at(&1).is_ok());
/// assert!(map.at(&2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNotFoundError;

impl fmt::Display for KeyNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl std::error::Error for KeyNotFoundError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        assert_eq!(KeyNotFoundError.to_string(), "key not found");
    }

    #[test]
    fn debug_is_derivable() {
        let dbg = format!("{:?}", KeyNotFoundError);
        assert!(dbg.contains("KeyNotFound"));
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<KeyNotFoundError>();
    }
}
