use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    /// Returns the next event's data, or `None` when the stream ends.
    /// A trailing incomplete event is discarded.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
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

    // A multi-byte character may be split across two chunks, so keep the
    // incomplete tail around until the next chunk arrives.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match str::from_utf8(&self.pending) {
            Ok(s) => {
                self.buf.push_str(s);
                self.pending.clear();
                return Ok(());
            }
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        let rest = self.pending.split_off(valid_up_to);
        if let Ok(s) = str::from_utf8(&self.pending) {
            self.buf.push_str(s);
        }
        self.pending = rest;
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event       = *( comment / field ) end-of-line
        // comment     = colon *any-char end-of-line
        // field       = 1*name-char [ colon [ space ] *any-char ] end-of-line
        //
        // Only `data` fields are kept. Events that carry no data (for
        // example keep-alive comments) are skipped.
        loop {
            let Some((eol_idx, eol_len)) = ["\n\n", "\r\n\r\n"]
                .into_iter()
                .filter_map(|eol| self.buf.find(eol).map(|idx| (idx, eol.len())))
                .min_by_key(|&(idx, _)| idx)
            else {
                return Ok(None);
            };

            let mut data: Option<String> = None;
            for line in self.buf[..eol_idx].lines() {
                let line = line.trim_end_matches('\r');
                if line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                if name != "data" {
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

            self.buf.drain(..eol_idx + eol_len);
            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}
