use serde_json::Value;

use crate::events::{AnthropicStopReason, AnthropicStreamEvent};

/// Incremental parser for SSE text streams.
///
/// Bytes are buffered raw and only complete frames are decoded, so multibyte
/// characters and CRLF delimiters may straddle network chunks.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

const FRAME_DELIMITERS: [&[u8]; 4] = [b"\r\n\r\n", b"\n\r\n", b"\r\n\n", b"\n\n"];

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AnthropicStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some((split, delimiter_len)) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..split + delimiter_len).collect();
            let frame = String::from_utf8_lossy(&raw[..split]).replace("\r\n", "\n");

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" || payload.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => {
                    if let Some(event) = map_event(value) {
                        events.push(event);
                    }
                }
                Err(error) => tracing::debug!(%error, "skipping malformed SSE frame"),
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<AnthropicStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

/// Earliest blank-line frame boundary as `(frame_len, delimiter_len)`.
fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    FRAME_DELIMITERS
        .iter()
        .filter_map(|delimiter| {
            buffer
                .windows(delimiter.len())
                .position(|window| window == *delimiter)
                .map(|position| (position, delimiter.len()))
        })
        .min_by(|left, right| left.0.cmp(&right.0).then(right.1.cmp(&left.1)))
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|value| value.as_str())
        .map(ToString::to_string)
}

fn map_event(value: Value) -> Option<AnthropicStreamEvent> {
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "message_start" => {
            let id = string_field(value.get("message").and_then(|message| message.get("id")));
            Some(AnthropicStreamEvent::MessageStart { id })
        }
        "content_block_delta" => {
            let delta = value.get("delta")?;
            if delta.get("type").and_then(|value| value.as_str()) != Some("text_delta") {
                return None;
            }
            let index = value
                .get("index")
                .and_then(|value| value.as_u64())
                .unwrap_or(0) as usize;
            let text = delta
                .get("text")
                .and_then(|value| value.as_str())
                .unwrap_or("");
            Some(AnthropicStreamEvent::TextDelta {
                index,
                text: text.to_owned(),
            })
        }
        "message_delta" => {
            let delta = value.get("delta");
            let stop_reason = delta
                .and_then(|delta| delta.get("stop_reason"))
                .and_then(|value| value.as_str())
                .and_then(AnthropicStopReason::parse);
            let stop_sequence = string_field(delta.and_then(|delta| delta.get("stop_sequence")));
            Some(AnthropicStreamEvent::MessageDelta {
                stop_reason,
                stop_sequence,
            })
        }
        "message_stop" => Some(AnthropicStreamEvent::MessageStop),
        "ping" => Some(AnthropicStreamEvent::Ping),
        "error" => {
            let error = value.get("error");
            let error_type = string_field(error.and_then(|error| error.get("type")));
            let message = string_field(error.and_then(|error| error.get("message")));
            Some(AnthropicStreamEvent::Error {
                error_type,
                message,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::SseStreamParser;
    use crate::events::AnthropicStreamEvent;

    #[test]
    fn parse_sse_frames_incrementally() {
        let mut parser = SseStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(
            b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
        ));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: [DONE]\n\n"));
        assert_eq!(events.len(), 1);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn crlf_framing_is_normalized() {
        let events = SseStreamParser::parse_frames(
            "event: ping\r\ndata: {\"type\":\"ping\"}\r\n\r\nevent: message_stop\r\ndata: {\"type\":\"message_stop\"}\r\n\r\n",
        );

        assert_eq!(
            events,
            vec![AnthropicStreamEvent::Ping, AnthropicStreamEvent::MessageStop]
        );
    }

    #[test]
    fn earliest_delimiter_wins() {
        assert_eq!(super::find_frame_end(b"a\r\n\r\nb\n\n"), Some((1, 4)));
        assert_eq!(super::find_frame_end(b"a\n\nb\r\n\r\n"), Some((1, 2)));
        assert_eq!(super::find_frame_end(b"a\r\n\r"), None);
    }
}
