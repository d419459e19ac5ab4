//! NDJSON stream encoder
//!
//! Order on the wire:
//!
//! 1. `l` per executed level in completion order, each followed by its `h`
//! 2. at most one `q`
//! 3. exactly one `r`
//! 4. `c` / `e` per streamed deferred value, in settlement order
//! 5. exactly one `d`
//!
//! The encoder is the only writer. Every item it yields is one complete
//! newline-terminated line.

use crate::pipeline::LoadOutcome;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use strata_wire::StreamMessage;

/// Messages of a streamed response, ending with `done`
pub fn message_stream(outcome: LoadOutcome) -> impl Stream<Item = StreamMessage> + Send + 'static {
    let before_ready = outcome.ready_messages();
    let LoadOutcome {
        mut settlements,
        controller,
        ..
    } = outcome;

    async_stream::stream! {
        // Producers are aborted when the stream (and so the controller) drops
        let _controller = controller;

        for message in before_ready {
            yield message;
        }

        while let Some(settlement) = settlements.recv().await {
            if let Err(error) = &settlement.result {
                tracing::warn!(
                    "Deferred {} in {} rejected: {}",
                    settlement.key,
                    settlement.level_id,
                    error
                );
            }
            yield StreamMessage::settlement(settlement.level_id, settlement.key, settlement.result);
        }

        yield StreamMessage::Done;
    }
}

/// Encoded lines, ready for `axum::body::Body::from_stream`
pub fn encode(outcome: LoadOutcome) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    message_stream(outcome).map(|message| Ok(message.to_line()))
}
