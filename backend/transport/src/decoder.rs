//! Incremental UTF-8 decoding of a response body.

use std::fmt;

use chatdeck_core::{TextStream, TransportError};
use futures::{Stream, StreamExt};

/// Decodes byte chunks into text, holding back a multibyte sequence that
/// was split across two chunks until its remaining bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning all text that is complete so far.
    ///
    /// Invalid sequences become U+FFFD.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still buffered once the body has ended.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Turn a byte stream into a [`TextStream`].
///
/// Chunks that decode to nothing are skipped. A read error ends the stream
/// after being yielded once.
pub fn decode_text_stream<S, B, E>(stream: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = (Box::pin(stream), Utf8ChunkDecoder::new(), false);

    Box::pin(futures::stream::unfold(
        state,
        |(mut inner, mut decoder, finished)| async move {
            if finished {
                return None;
            }
            loop {
                match inner.next().await {
                    Some(Ok(bytes)) => {
                        let text = decoder.decode(bytes.as_ref());
                        if !text.is_empty() {
                            return Some((Ok(text), (inner, decoder, false)));
                        }
                    }
                    Some(Err(e)) => {
                        let err = TransportError::Stream(e.to_string());
                        return Some((Err(err), (inner, decoder, true)));
                    }
                    None => {
                        let tail = decoder.finish();
                        if tail.is_empty() {
                            return None;
                        }
                        return Some((Ok(tail), (inner, decoder, true)));
                    }
                }
            }
        },
    ))
}
