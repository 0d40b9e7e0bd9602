//! Turns a [`Subscription`] into the SSE framing the control surface promises:
//! one `data:` line per event, JSON-encoded with the envelope's `type` tag
//! already flattened in by [`forgepipe_core::event::Event`]'s `Serialize` impl.

use axum::response::sse::Event as SseEvent;
use futures::Stream;

use forgepipe_bus::Subscription;

pub fn event_stream(mut subscription: Subscription) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => yield Ok(SseEvent::default().data(payload)),
                Err(err) => {
                    tracing::warn!(target: "forgepipe::api", %err, "failed to encode event for subscriber, dropping it");
                }
            }
        }
    }
}
