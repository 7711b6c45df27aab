use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use sidecar_llm::{LLMError, LLMStream, StreamChunk};

/// Result of waiting for the next stream item.
#[derive(Debug)]
pub enum StreamStep {
    Chunk(StreamChunk),
    Finished,
    Cancelled,
    Failed(LLMError),
}

/// Wait for the next chunk, racing it against cancellation.
///
/// Cancellation is checked before and after the wait, so an item that was
/// already buffered when the token fired is never reported as a chunk.
pub async fn next_step(stream: &mut LLMStream, cancel: &CancellationToken) -> StreamStep {
    if cancel.is_cancelled() {
        return StreamStep::Cancelled;
    }

    let item = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamStep::Cancelled,
        item = stream.next() => item,
    };

    if cancel.is_cancelled() {
        return StreamStep::Cancelled;
    }

    match item {
        Some(Ok(chunk)) => StreamStep::Chunk(chunk),
        Some(Err(LLMError::Cancelled)) => StreamStep::Cancelled,
        Some(Err(error)) => StreamStep::Failed(error),
        None => StreamStep::Finished,
    }
}
