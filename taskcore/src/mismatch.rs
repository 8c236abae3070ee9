//! Change descriptors and optimistic-concurrency mismatch detection.
//!
//! Commands that rewrite a field carry a [`ValueChange`]: the value the
//! sender believes is current plus the value it wants written. Before
//! emitting anything, the handler compares the declared previous value
//! against the aggregate's real current value. A disagreement means the
//! sender decided against stale state, and the command is rejected with a
//! [`ValueMismatch`] instead of silently overwriting.

use serde::{Deserialize, Serialize};

use crate::types::EventVersion;

/// A declared field rewrite: what the sender saw, and what it wants.
///
/// Successful change events embed the full descriptor so the log records
/// both sides of every rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange<T> {
    /// The value the sender observed before deciding on the change.
    pub previous: T,
    /// The value to write.
    pub new: T,
}

impl<T> ValueChange<T> {
    /// Creates a change descriptor from an observed and a desired value.
    pub const fn new(previous: T, new: T) -> Self {
        Self { previous, new }
    }
}

/// Evidence of a stale declared previous value.
///
/// Produced only when a command's declared previous value disagrees with
/// the aggregate's actual current value. Carries everything the sender
/// needs to re-decide: what it declared, what was really there, what it
/// wanted to write, and the aggregate version at the moment of the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMismatch<T> {
    /// The previous value the command declared.
    pub expected: T,
    /// The value actually found on the aggregate.
    pub actual: T,
    /// The new value the command wanted to write.
    pub proposed: T,
    /// Aggregate version at the moment of comparison.
    pub version_at_check: EventVersion,
}

impl<T: std::fmt::Debug> std::fmt::Display for ValueMismatch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {:?} but found {:?} (proposed {:?}, version {})",
            self.expected, self.actual, self.proposed, self.version_at_check
        )
    }
}

/// Compares a declared previous value against the actual current value.
///
/// Returns `Ok(())` when they agree structurally; otherwise the full
/// [`ValueMismatch`] for the rejecting command to carry. The comparison is
/// pure: no event is emitted and no state changes either way.
pub fn detect<T>(
    change: &ValueChange<T>,
    actual: &T,
    version_at_check: EventVersion,
) -> Result<(), ValueMismatch<T>>
where
    T: Clone + PartialEq,
{
    if change.previous == *actual {
        Ok(())
    } else {
        Err(ValueMismatch {
            expected: change.previous.clone(),
            actual: actual.clone(),
            proposed: change.new.clone(),
            version_at_check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskDescription;
    use proptest::prelude::*;

    fn description(s: &str) -> TaskDescription {
        TaskDescription::try_new(s).unwrap()
    }

    #[test]
    fn agreeing_previous_value_passes() {
        let change = ValueChange::new(description("old"), description("new"));
        let actual = description("old");
        assert!(detect(&change, &actual, EventVersion::initial()).is_ok());
    }

    #[test]
    fn stale_previous_value_reports_the_full_mismatch() {
        let change = ValueChange::new(description("what i saw"), description("what i want"));
        let actual = description("what is really there");
        let version = EventVersion::try_new(7).unwrap();

        let mismatch = detect(&change, &actual, version).unwrap_err();
        assert_eq!(mismatch.expected, description("what i saw"));
        assert_eq!(mismatch.actual, description("what is really there"));
        assert_eq!(mismatch.proposed, description("what i want"));
        assert_eq!(mismatch.version_at_check, version);
    }

    #[test]
    fn default_previous_matches_a_fresh_field() {
        let change = ValueChange::new(TaskDescription::default(), description("first value"));
        assert!(detect(&change, &TaskDescription::default(), EventVersion::initial()).is_ok());
    }

    proptest! {
        #[test]
        fn detect_rejects_iff_values_differ(
            declared in "[a-z]{0,12}",
            actual in "[a-z]{0,12}",
            version in 0u64..10_000,
        ) {
            let change = ValueChange::new(description(&declared), description("next"));
            let current = description(&actual);
            let version = EventVersion::try_new(version).unwrap();
            let outcome = detect(&change, &current, version);
            if declared == actual {
                prop_assert!(outcome.is_ok());
            } else {
                let mismatch = outcome.unwrap_err();
                prop_assert_eq!(mismatch.expected.as_ref(), &declared);
                prop_assert_eq!(mismatch.actual.as_ref(), &actual);
                prop_assert_eq!(mismatch.version_at_check, version);
            }
        }
    }
}
