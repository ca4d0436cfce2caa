use std::io::{ErrorKind, Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, VeilError};

use super::{StreamStats, StreamingBuffer};

/// Read size used by callers that have no better figure.
pub const DEFAULT_CHUNK_BYTES: usize = 8 * 1024;

/// Turns a byte stream into `&str` chunks, carrying a UTF-8 sequence cut by
/// a read boundary over to the next read.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(VeilError::from(invalid_utf8(e))),
        };
        let rest = self.pending.split_off(valid);
        let complete = std::mem::replace(&mut self.pending, rest);
        String::from_utf8(complete).map_err(|e| VeilError::from(invalid_utf8(e.utf8_error())))
    }

    fn finish(self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(VeilError::from(std::io::Error::new(
                ErrorKind::InvalidData,
                "stream ended inside a UTF-8 sequence",
            )))
        }
    }
}

fn invalid_utf8(e: std::str::Utf8Error) -> std::io::Error {
    std::io::Error::new(ErrorKind::InvalidData, e)
}

/// Redact everything `reader` produces into `writer`, `chunk_bytes` at a time,
/// then finalize the buffer. Returns the buffer's stats afterwards.
pub fn redact_reader<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    buffer: &mut StreamingBuffer,
    chunk_bytes: usize,
) -> Result<StreamStats> {
    let mut raw = vec![0u8; chunk_bytes.max(1)];
    let mut carry = Utf8Carry::default();
    loop {
        let n = match reader.read(&mut raw) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let text = carry.push(&raw[..n])?;
        let out = buffer.add_chunk(&text)?;
        writer.write_all(out.as_bytes())?;
    }
    carry.finish()?;
    writer.write_all(buffer.finalize()?.as_bytes())?;
    writer.flush()?;
    Ok(buffer.get_stats())
}

/// Async counterpart of [`redact_reader`]. Detection itself stays
/// synchronous; only the reads and writes await.
pub async fn redact_async_reader<R, W>(
    mut reader: R,
    mut writer: W,
    buffer: &mut StreamingBuffer,
    chunk_bytes: usize,
) -> Result<StreamStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = vec![0u8; chunk_bytes.max(1)];
    let mut carry = Utf8Carry::default();
    loop {
        let n = reader.read(&mut raw).await?;
        if n == 0 {
            break;
        }
        let text = carry.push(&raw[..n])?;
        let out = buffer.add_chunk(&text)?;
        writer.write_all(out.as_bytes()).await?;
    }
    carry.finish()?;
    writer.write_all(buffer.finalize()?.as_bytes()).await?;
    writer.flush().await?;
    Ok(buffer.get_stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carry_splits_multibyte_sequence() {
        let bytes = "wörld".as_bytes();
        let mut carry = Utf8Carry::default();
        // Cut between the two bytes of 'ö'.
        assert_eq!(carry.push(&bytes[..2]).unwrap(), "w");
        assert_eq!(carry.push(&bytes[2..]).unwrap(), "örld");
        carry.finish().unwrap();
    }

    #[test]
    fn test_carry_rejects_invalid_bytes() {
        let mut carry = Utf8Carry::default();
        assert!(carry.push(&[b'a', 0xff, b'b']).is_err());
    }

    #[test]
    fn test_carry_truncated_at_eof() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.push(&"é".as_bytes()[..1]).unwrap(), "");
        assert!(carry.finish().is_err());
    }
}
