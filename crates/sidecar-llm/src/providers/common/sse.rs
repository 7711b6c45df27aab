//! SSE body -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::{future, StreamExt};
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::StreamChunk;

/// Turn a `text/event-stream` [`Response`] into an [`LLMStream`].
///
/// `parse` sees the `data:` payload of every event. `Ok(None)` skips the
/// event. The first error is yielded and ends the stream, so a consumer never
/// sees chunks that follow a failure. Malformed SSE framing is reported as
/// [`LLMError::Stream`]; errors returned by `parse` pass through unchanged.
pub fn sse_chunk_stream<P>(response: Response, mut parse: P) -> LLMStream
where
    P: FnMut(&str) -> Result<Option<StreamChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| match event {
            Ok(event) => parse(&event.data),
            Err(error) => Err(LLMError::Stream(format!("SSE decode failed: {}", error))),
        })
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .filter_map(|item| future::ready(item.transpose()));

    Box::pin(stream)
}
