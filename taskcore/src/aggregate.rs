//! The pure command/fold contract every aggregate implements.
//!
//! Handling never mutates: `handle` decides against current state and
//! returns events or a rejection, `apply` folds one event into a new state
//! value. Replaying a full history from the default state must reproduce
//! the live state exactly, every time.

use serde::{de::DeserializeOwned, Serialize};

/// A consistency boundary whose state is derived solely by folding its own
/// ordered event log.
pub trait Aggregate: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name of the aggregate type, used in logs and lookups.
    const AGGREGATE_TYPE: &'static str;

    /// Commands this aggregate decides on.
    type Command;

    /// Events this aggregate records.
    type Event: Clone + Send + Sync;

    /// Business rejections this aggregate can answer with.
    type Rejection: std::error::Error;

    /// Decides a command against the current state.
    ///
    /// Pure: returns the events to record, or a rejection. Emitting nothing
    /// and rejecting nothing is not an outcome any handler produces.
    fn handle(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Rejection>;

    /// Folds one event into the state, returning the new state.
    ///
    /// Pure and total: every recorded event must be applicable, and
    /// applying the same history in the same order always produces the
    /// same state. Each application advances the aggregate version by
    /// exactly one.
    #[must_use]
    fn apply(self, event: &Self::Event) -> Self;

    /// Rebuilds state by folding an ordered history from the default state.
    fn replay<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        events.into_iter().fold(Self::default(), Self::apply)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{Tally, TallyCommand, TallyEvent, TallyRejection};
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn handle_is_pure_and_leaves_state_untouched() {
        let state = Tally::default();
        let events = state.handle(TallyCommand::Add(5)).unwrap();
        assert_eq!(events, vec![TallyEvent::Added(5)]);
        assert_eq!(state, Tally::default());
    }

    #[test]
    fn handle_rejects_without_emitting() {
        let state = Tally::default();
        assert_eq!(
            state.handle(TallyCommand::Add(0)),
            Err(TallyRejection::ZeroEntry)
        );
    }

    #[test]
    fn replay_of_empty_history_is_the_default_state() {
        assert_eq!(Tally::replay([]), Tally::default());
    }

    proptest! {
        #[test]
        fn replay_equals_incremental_application(amounts in proptest::collection::vec(-100i64..100, 0..30)) {
            let events: Vec<TallyEvent> = amounts.iter().copied().map(TallyEvent::Added).collect();

            let incremental = events
                .iter()
                .fold(Tally::default(), Tally::apply);
            let replayed = Tally::replay(&events);

            prop_assert_eq!(incremental, replayed);
        }

        #[test]
        fn replay_is_deterministic(amounts in proptest::collection::vec(-100i64..100, 0..30)) {
            let events: Vec<TallyEvent> = amounts.iter().copied().map(TallyEvent::Added).collect();
            prop_assert_eq!(Tally::replay(&events), Tally::replay(&events));
        }
    }
}
