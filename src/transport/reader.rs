//! Bounded response body reader with transparent decompression.

use bytes::Bytes;
use flate2::write::{GzDecoder, ZlibDecoder};
use futures::StreamExt;
use std::io::{self, Write};

/// Failure while reading a response body.
#[derive(Debug, Clone)]
pub(crate) enum ReadError {
    /// The (decompressed) body exceeded the limit.
    TooLarge { limit: u64, received: u64 },
    /// Stream or decoding failure, including premature EOF mid-body.
    Io { message: String },
}

/// Read a response body into bytes, enforcing `max_bytes`.
///
/// `Content-Encoding: gzip`/`deflate` bodies are decompressed as bytes are
/// read, and the *decompressed* size counts against the limit, so memory
/// never exceeds `max_bytes` plus one decoder buffer. Dropping the response
/// on error closes the connection.
pub(crate) async fn read_limited(
    response: reqwest::Response,
    max_bytes: u64,
) -> Result<Bytes, ReadError> {
    let encoding = response
        .headers()
        .get(http::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut decoder = BodyDecoder::for_encoding(&encoding, max_bytes);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ReadError::Io {
            message: format!("body read failed: {e}"),
        })?;
        decoder.push(&chunk)?;
    }

    decoder.finish()
}

/// Incremental decoder accumulating at most `max` decompressed bytes.
enum BodyDecoder {
    Identity { buf: Vec<u8>, max: u64 },
    Gzip { decoder: GzDecoder<LimitedBuf>, max: u64 },
    Deflate { decoder: ZlibDecoder<LimitedBuf>, max: u64 },
}

impl BodyDecoder {
    fn for_encoding(encoding: &str, max: u64) -> Self {
        match encoding {
            "gzip" | "x-gzip" => BodyDecoder::Gzip {
                decoder: GzDecoder::new(LimitedBuf::new(max)),
                max,
            },
            "deflate" => BodyDecoder::Deflate {
                decoder: ZlibDecoder::new(LimitedBuf::new(max)),
                max,
            },
            _ => BodyDecoder::Identity { buf: Vec::new(), max },
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<(), ReadError> {
        match self {
            BodyDecoder::Identity { buf, max } => {
                let received = buf.len() as u64 + chunk.len() as u64;
                if received > *max {
                    return Err(ReadError::TooLarge { limit: *max, received });
                }
                buf.extend_from_slice(chunk);
                Ok(())
            }
            BodyDecoder::Gzip { decoder, max } => match decoder.write_all(chunk) {
                Ok(()) => Ok(()),
                Err(e) => Err(read_error(e, *max, decoder.get_ref().observed)),
            },
            BodyDecoder::Deflate { decoder, max } => match decoder.write_all(chunk) {
                Ok(()) => Ok(()),
                Err(e) => Err(read_error(e, *max, decoder.get_ref().observed)),
            },
        }
    }

    fn finish(self) -> Result<Bytes, ReadError> {
        match self {
            BodyDecoder::Identity { buf, .. } => Ok(Bytes::from(buf)),
            BodyDecoder::Gzip { mut decoder, max } => match decoder.try_finish() {
                Ok(()) => Ok(Bytes::from(decoder.finish().map_err(|e| ReadError::Io {
                    message: format!("body decoding failed: {e}"),
                })?.buf)),
                Err(e) => Err(read_error(e, max, decoder.get_ref().observed)),
            },
            BodyDecoder::Deflate { mut decoder, max } => match decoder.try_finish() {
                Ok(()) => Ok(Bytes::from(decoder.finish().map_err(|e| ReadError::Io {
                    message: format!("body decoding failed: {e}"),
                })?.buf)),
                Err(e) => Err(read_error(e, max, decoder.get_ref().observed)),
            },
        }
    }
}

fn read_error(error: io::Error, limit: u64, observed: u64) -> ReadError {
    if error.kind() == io::ErrorKind::WriteZero {
        ReadError::TooLarge { limit, received: observed }
    } else {
        ReadError::Io {
            message: format!("body decoding failed: {error}"),
        }
    }
}

/// Write sink that refuses to grow beyond `max` bytes, recording how many
/// bytes were attempted.
struct LimitedBuf {
    buf: Vec<u8>,
    max: u64,
    observed: u64,
}

impl LimitedBuf {
    fn new(max: u64) -> Self {
        Self { buf: Vec::new(), max, observed: 0 }
    }
}

impl Write for LimitedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.observed = self.buf.len() as u64 + data.len() as u64;
        if self.observed > self.max {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "decompressed body limit reached",
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
