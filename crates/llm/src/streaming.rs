//! Common streaming infrastructure for chat providers
//!
//! Providers hand a chunk source and a frame parser to [`process_stream`],
//! which splits the body into lines, runs each line through the parser and
//! forwards the resulting text deltas in order. The same processing runs for
//! live HTTP responses and for scripted chunks in tests.

use crate::{ApiError, StreamingCallback, StreamingChunk};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use tracing::trace;

/// Trait for streaming chunk sources (real HTTP response or scripted chunks)
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError>;
}

/// Real HTTP response chunk stream
pub struct HttpChunkStream {
    response: Response,
}

impl HttpChunkStream {
    /// Fails with a protocol error for statuses that never carry a body.
    /// An empty body on any other status is an empty stream.
    pub fn new(response: Response) -> Result<Self, ApiError> {
        if matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
        ) {
            return Err(ApiError::Protocol(
                "response does not contain a body to read".to_string(),
            ));
        }
        Ok(Self { response })
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(ApiError::Network(format!("HTTP chunk error: {e}"))),
        }
    }
}

/// Pre-recorded chunks, replayed in order
pub struct ScriptedChunkStream {
    chunks: std::vec::IntoIter<Vec<u8>>,
}

impl ScriptedChunkStream {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

#[async_trait]
impl ChunkStream for ScriptedChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        Ok(self.chunks.next())
    }
}

/// Splits a byte stream into newline-delimited frames.
///
/// Bytes are buffered until a line feed arrives, so a multi-byte character
/// split across two chunks is only decoded once it is complete.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = Self::decode_line(&line[..line.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns the unterminated remainder, if it holds anything but whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    fn decode_line(bytes: &[u8]) -> Option<String> {
        let decoded = String::from_utf8_lossy(bytes);
        let text = decoded.strip_suffix('\r').unwrap_or(&*decoded);
        if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Drives `source` to the end, forwarding every non-empty delta produced by
/// `parse_frame` and finally `StreamingComplete`.
pub async fn process_stream<S, P>(
    source: &mut S,
    parse_frame: P,
    callback: &StreamingCallback,
) -> Result<(), ApiError>
where
    S: ChunkStream + ?Sized,
    P: Fn(&str) -> Option<String>,
{
    let mut decoder = StreamDecoder::new();

    let emit = |line: &str| -> Result<(), ApiError> {
        match parse_frame(line) {
            Some(delta) if !delta.is_empty() => callback(&StreamingChunk::Text(delta)),
            _ => {
                trace!("Skipping frame without content: '{line}'");
                Ok(())
            }
        }
    };

    while let Some(chunk) = source.next_chunk().await? {
        for line in decoder.push(&chunk) {
            emit(&line)?;
        }
    }

    if let Some(line) = decoder.finish() {
        emit(&line)?;
    }

    callback(&StreamingChunk::StreamingComplete)
}

/// Strips the SSE `data: ` prefix. Lines without it are not content frames.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting_callback() -> (StreamingCallback, Arc<Mutex<Vec<StreamingChunk>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: StreamingCallback = Box::new(move |chunk: &StreamingChunk| {
            sink.lock().unwrap().push(chunk.clone());
            Ok(())
        });
        (callback, events)
    }

    fn echo(line: &str) -> Option<String> {
        Some(line.to_string())
    }

    #[test]
    fn keeps_partial_line_until_next_chunk() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(b"first\nsec"), vec!["first".to_string()]);
        assert_eq!(decoder.push(b"ond\n"), vec!["second".to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn reassembles_multibyte_characters_across_chunks() {
        let text = "canción ñandú\n".as_bytes();
        // Split inside the two-byte 'ó'
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["canción ñandú".to_string()]);
    }

    #[test]
    fn skips_blank_lines_and_strips_carriage_returns() {
        let mut decoder = StreamDecoder::new();
        let lines = decoder.push(b"data: a\r\n\r\n   \ndata: b\n");
        assert_eq!(lines, vec!["data: a".to_string(), "data: b".to_string()]);
    }

    #[tokio::test]
    async fn unterminated_final_line_is_processed_after_end_of_stream() {
        let (callback, events) = collecting_callback();
        let mut source = ScriptedChunkStream::new(vec![b"one\ntw".to_vec(), b"o".to_vec()]);

        process_stream(&mut source, echo, &callback).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StreamingChunk::Text("one".to_string()),
                StreamingChunk::Text("two".to_string()),
                StreamingChunk::StreamingComplete,
            ]
        );
    }

    #[tokio::test]
    async fn empty_deltas_are_not_forwarded() {
        let (callback, events) = collecting_callback();
        let mut source = ScriptedChunkStream::new(vec![b"keep\ndrop\nskip\n".to_vec()]);

        process_stream(
            &mut source,
            |line| match line {
                "keep" => Some("kept".to_string()),
                "drop" => Some(String::new()),
                _ => None,
            },
            &callback,
        )
        .await
        .unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StreamingChunk::Text("kept".to_string()),
                StreamingChunk::StreamingComplete
            ]
        );
    }

    #[tokio::test]
    async fn callback_error_stops_processing() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let callback: StreamingCallback = Box::new(move |_chunk: &StreamingChunk| {
            *counter.lock().unwrap() += 1;
            Err(ApiError::Cancelled)
        });
        let mut source = ScriptedChunkStream::new(vec![b"a\nb\nc\n".to_vec()]);

        let result = process_stream(&mut source, echo, &callback).await;

        assert!(matches!(result, Err(ApiError::Cancelled)));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_stream_still_completes_once() {
        let (callback, events) = collecting_callback();
        let mut source = ScriptedChunkStream::new(Vec::new());

        process_stream(&mut source, echo, &callback).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![StreamingChunk::StreamingComplete]
        );
    }
}
