/// Errors raised while turning an event into statements.
///
/// Every variant is fatal for the projection: the offending event must not
/// be skipped.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    #[error("Malformed payload for {event_type} at sequence {sequence}: {source}")]
    MalformedPayload {
        event_type: String,
        sequence: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected event {event_type} on {aggregate_type} aggregate, expected one of {expected:?}")]
    UnexpectedEventShape {
        aggregate_type: String,
        event_type: String,
        expected: Vec<&'static str>,
    },

    #[error("Sequence {sequence} of {event_type} exceeds the BIGINT range")]
    SequenceOutOfRange { event_type: String, sequence: u64 },

    #[error("Reducer registered twice for {aggregate_type}/{event_type}")]
    DuplicateReducer {
        aggregate_type: &'static str,
        event_type: &'static str,
    },
}
