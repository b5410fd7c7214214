//! Bounded message framing.
//!
//! A peer writes its whole message and then half-closes its write side, so
//! the end of a message is the end of the stream. Reads are capped; anything
//! longer is drained no further and reported as oversized.

use std::io::{self, Read, Write};

const CHUNK_BYTES: usize = 8 * 1024;

/// Outcome of reading one framed message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MessageRead {
    /// The peer closed its write side after at most `limit` bytes.
    Complete(Vec<u8>),
    /// More than `limit` bytes arrived; the partial message was discarded.
    Oversized { received: usize },
}

/// Reads until end-of-stream, giving up once more than `limit` bytes arrive.
pub(crate) fn read_message<R: Read>(reader: &mut R, limit: usize) -> io::Result<MessageRead> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; CHUNK_BYTES];
    loop {
        let bytes_read = read_with_retry(reader, &mut chunk)?;
        if bytes_read == 0 {
            return Ok(MessageRead::Complete(buffer));
        }
        buffer.extend_from_slice(chunk.get(..bytes_read).unwrap_or_default());
        if buffer.len() > limit {
            return Ok(MessageRead::Oversized {
                received: buffer.len(),
            });
        }
    }
}

/// Writes a complete message and flushes it.
pub(crate) fn write_message<W: Write>(writer: &mut W, message: &str) -> io::Result<()> {
    writer.write_all(message.as_bytes())?;
    writer.flush()
}

fn read_with_retry<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
