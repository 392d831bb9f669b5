//! Server-sent-events rendering of run events.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use wfaas::Event;

use super::error;

/// SSE event name for an [`Event`].
pub fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Thought(_) => "thought",
        Event::Message(_) => "message",
        Event::StructuredPayload(_) => "function_call",
        Event::Error(_) => "error",
    }
}

/// Format one event as an SSE frame.
///
/// Each line of the payload gets its own `data:` line; `\r\n` and a lone `\r`
/// count as line breaks, as SSE clients treat them. The frame ends with a
/// blank line. Structured payloads are written as compact JSON.
pub fn encode_event(event: &Event) -> Bytes {
    let payload = match event {
        Event::Thought(text) | Event::Message(text) | Event::Error(text) => text.clone(),
        Event::StructuredPayload(value) => value.to_string(),
    };

    let mut frame = format!("event: {}\n", event_name(event));
    let payload = payload.replace("\r\n", "\n").replace('\r', "\n");
    for line in payload.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}

/// Wrap an event stream in a `text/event-stream` response.
pub fn sse_response<S>(events: S) -> Response
where
    S: Stream<Item = Event> + Send + 'static,
{
    let body = events.map(|event| Ok::<_, Infallible>(encode_event(&event)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|e| {
            error::create_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "sse_build_failed",
                e.to_string(),
            )
            .into_response()
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_text_events() {
        assert_eq!(
            encode_event(&Event::Thought("Looking...".into())),
            Bytes::from("event: thought\ndata: Looking...\n\n")
        );
        assert_eq!(
            encode_event(&Event::Message("line one\nline two".into())),
            Bytes::from("event: message\ndata: line one\ndata: line two\n\n")
        );
        assert_eq!(
            encode_event(&Event::Error("model call failed".into())),
            Bytes::from("event: error\ndata: model call failed\n\n")
        );
    }

    #[test]
    fn test_encode_payload_compact() {
        let event = Event::StructuredPayload(json!({"action": "open_map", "lat": 1.5}));
        assert_eq!(
            encode_event(&event),
            Bytes::from("event: function_call\ndata: {\"action\":\"open_map\",\"lat\":1.5}\n\n")
        );
    }

    #[test]
    fn test_encode_carriage_returns_as_line_breaks() {
        assert_eq!(
            encode_event(&Event::Message("a\r\nb\rc\nd".into())),
            Bytes::from("event: message\ndata: a\ndata: b\ndata: c\ndata: d\n\n")
        );
    }

    #[test]
    fn test_encode_empty_message() {
        assert_eq!(
            encode_event(&Event::Message(String::new())),
            Bytes::from("event: message\ndata: \n\n")
        );
    }
}
