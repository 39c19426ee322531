use std::fmt::{self, Display};

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChunksError(err) => err.fmt(f),
            Error::InvalidPayload => write!(f, "invalid event stream payload"),
        }
    }
}

/// A type for reading the `data` of server-sent events from a chunk
/// stream.
pub struct Sse {
    buf: String,
    // Trailing bytes of a multi-byte character split across chunks.
    partial_char: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            partial_char: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Parse what is buffered first, a single chunk may carry
            // several events.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.partial_char.extend_from_slice(bytes);
        let mut valid_len = match str::from_utf8(&self.partial_char) {
            Ok(_) => self.partial_char.len(),
            // An incomplete sequence at the end is completed by the next
            // chunk, anything else is garbage.
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        // A trailing `\r` may be the first half of a CRLF split across
        // chunks, keep it until the next chunk arrives.
        if valid_len > 0 && self.partial_char[valid_len - 1] == b'\r' {
            valid_len -= 1;
        }
        let rest = self.partial_char.split_off(valid_len);
        let text = str::from_utf8(&self.partial_char)
            .map_err(|_| Error::InvalidPayload)?;
        self.buf.push_str(&text.replace("\r\n", "\n"));
        self.partial_char = rest;
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event       = *( comment / field ) end-of-line
        // comment     = colon *any-char end-of-line
        // field       = 1*name-char [ colon [ space ] *any-char ] end-of-line
        //
        // Only `data` fields are kept, other fields are skipped. Blocks
        // without any data (e.g. keep-alive comments) are consumed silently.
        while let Some(eol_idx) = self.buf.find("\n\n") {
            let mut data: Option<String> = None;
            for line in self.buf[..eol_idx].lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                if name != "data" {
                    trace!("skipping sse field: {name}");
                    continue;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(..eol_idx + 2);

            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        let chunks = chunks.iter().copied().map(Bytes::from_static).collect();
        Sse::new(Chunks::from_vec_deque(chunks))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_events_in_one_chunk() {
        let mut sse = sse_from(&[b"data: one\n\ndata: two\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "two");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse_from(&[b"data:", b" hello\r\n", b"\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: one\r\n\r", b"\ndata: two\r\n\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "two");
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: one\r", b"\n\r", b"\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_comments_and_other_fields() {
        let mut sse = sse_from(&[
            b": keep-alive\n\n",
            b"event: message\nid: 7\ndata: first\ndata: second\n\n",
        ]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "first\nsecond"
        );
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_multibyte_character() {
        // "é" is 0xC3 0xA9.
        let mut sse = sse_from(&[b"data: caf\xC3", b"\xA9\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "café");
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"xxxxxx\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse_from(&[b"xxxxxx\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: \xFF\xFE\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);
    }
}
