/*!
Binary log framing shared by every file-backed strategy.

A log starts with a three-line textual header (two unsigned counters and a `-1`
sentinel) followed by zero or more frames. Each frame is a 4-byte big-endian
signed length and that many bytes of a `bincode`-encoded [`Command`].

```text
0\n
0\n
-1\n
[len: i32 BE][payload; len] ...
```
*/

use crate::{Command, ReplayError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};
use std::str::FromStr;

/// Sentinel closing the textual header
pub const HEADER_SENTINEL: i64 = -1;

/// Size of the length prefix in front of every payload
pub const FRAME_PREFIX_LEN: usize = 4;

/// Counters carried by a log header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogHeader {
    pub first: u64,
    pub last: u64,
}

/// Write the compatibility header used by the discard, immediate and batched logs
pub fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    write_header_with(writer, LogHeader::default())
}

/// Write a header carrying explicit counters
pub fn write_header_with<W: Write>(writer: &mut W, header: LogHeader) -> Result<()> {
    let text = format!("{}\n{}\n{}\n", header.first, header.last, HEADER_SENTINEL);
    writer.write_all(text.as_bytes())?;
    Ok(())
}

/// Append one framed command to `buf`
///
/// # Errors
/// * `ReplayError::Serialization` - If the command cannot be encoded or its
///   payload does not fit the signed 32-bit length prefix
pub fn encode_frame(buf: &mut BytesMut, command: &Command) -> Result<()> {
    let payload = bincode::serialize(command).map_err(|e| {
        ReplayError::serialization(format!(
            "Failed to encode command for key '{}': {e}",
            command.key
        ))
    })?;

    let len = i32::try_from(payload.len()).map_err(|_| {
        ReplayError::serialization(format!(
            "Payload of {} bytes for key '{}' exceeds the frame limit",
            payload.len(),
            command.key
        ))
    })?;

    buf.reserve(FRAME_PREFIX_LEN + payload.len());
    buf.put_i32(len);
    buf.put_slice(&payload);
    Ok(())
}

/// Write a complete log (header and frames) in a single write
pub fn write_log<W: Write>(writer: &mut W, commands: &[Command]) -> Result<()> {
    write_header(writer)?;

    let mut buf = BytesMut::new();
    for command in commands {
        encode_frame(&mut buf, command)?;
    }
    writer.write_all(&buf)?;
    Ok(())
}

/// Decode every command of a framed log
pub fn read_log<R: Read>(reader: R) -> Result<Vec<Command>> {
    let (_, commands) = read_log_with_header(reader)?;
    Ok(commands)
}

/// Decode a framed log, returning its header counters alongside the commands
pub fn read_log_with_header<R: Read>(mut reader: R) -> Result<(LogHeader, Vec<Command>)> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    let mut buf = Bytes::from(raw);

    let first = next_header_field::<u64>(&mut buf, "first counter")?;
    let last = next_header_field::<u64>(&mut buf, "second counter")?;
    let sentinel = next_header_field::<i64>(&mut buf, "sentinel")?;
    if sentinel != HEADER_SENTINEL {
        return Err(ReplayError::invalid_format(format!(
            "expected header sentinel {HEADER_SENTINEL}, found {sentinel}"
        )));
    }

    let mut commands = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < FRAME_PREFIX_LEN {
            return Err(ReplayError::invalid_format(format!(
                "truncated length prefix after {} frames",
                commands.len()
            )));
        }

        let len = buf.get_i32();
        if len < 0 {
            return Err(ReplayError::invalid_format(format!(
                "negative frame length {len} at frame {}",
                commands.len()
            )));
        }

        let len = len as usize;
        if buf.remaining() < len {
            return Err(ReplayError::invalid_format(format!(
                "frame {} declares {len} bytes but only {} remain",
                commands.len(),
                buf.remaining()
            )));
        }

        let payload = buf.split_to(len);
        let command: Command = bincode::deserialize(&payload).map_err(|e| {
            ReplayError::invalid_format(format!(
                "undecodable payload at frame {}: {e}",
                commands.len()
            ))
        })?;
        commands.push(command);
    }

    Ok((LogHeader { first, last }, commands))
}

fn next_header_field<T: FromStr>(buf: &mut Bytes, field: &str) -> Result<T> {
    let end = buf
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| ReplayError::invalid_format(format!("missing {field} line in log header")))?;

    let line = buf.split_to(end);
    buf.advance(1);

    let text = std::str::from_utf8(&line)
        .map_err(|_| ReplayError::invalid_format(format!("non UTF-8 {field} in log header")))?
        .trim();

    text.parse::<T>()
        .map_err(|_| ReplayError::invalid_format(format!("invalid {field} '{text}' in log header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_trace() -> Vec<Command> {
        vec![
            Command::set("k1", "v1"),
            Command::get("k1"),
            Command::delete("k1"),
            Command::set("binary", vec![0u8, 255, 10, 13]),
        ]
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        assert_eq!(out, b"0\n0\n-1\n");
    }

    #[test]
    fn test_frame_prefix_is_big_endian_length() {
        let command = Command::set("key", "value");
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, &command).unwrap();

        let payload = bincode::serialize(&command).unwrap();
        assert_eq!(&buf[..4], (payload.len() as i32).to_be_bytes());
        assert_eq!(&buf[4..], payload.as_slice());
    }

    #[test]
    fn test_log_roundtrip_preserves_order() {
        let commands = sample_trace();
        let mut raw = Vec::new();
        write_log(&mut raw, &commands).unwrap();

        let decoded = read_log(Cursor::new(raw)).unwrap();
        assert_eq!(decoded, commands);
    }

    #[test]
    fn test_header_only_log_has_no_commands() {
        let decoded = read_log(Cursor::new(b"0\n0\n-1\n".to_vec())).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_header_counters_are_returned() {
        let mut raw = Vec::new();
        write_header_with(&mut raw, LogHeader { first: 10, last: 19 }).unwrap();

        let (header, commands) = read_log_with_header(Cursor::new(raw)).unwrap();
        assert_eq!(header, LogHeader { first: 10, last: 19 });
        assert!(commands.is_empty());
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let result = read_log(Cursor::new(Vec::new()));
        assert!(matches!(result, Err(ReplayError::InvalidFormat(_))));
    }

    #[test]
    fn test_wrong_sentinel_is_rejected() {
        let result = read_log(Cursor::new(b"0\n0\n7\n".to_vec()));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("sentinel"));
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let mut raw = Vec::new();
        write_log(&mut raw, &sample_trace()).unwrap();
        raw.truncate(raw.len() - 2);

        let result = read_log(Cursor::new(raw));
        assert!(matches!(result, Err(ReplayError::InvalidFormat(_))));
    }

    #[test]
    fn test_negative_length_is_rejected() {
        let mut raw = b"0\n0\n-1\n".to_vec();
        raw.extend_from_slice(&(-5i32).to_be_bytes());

        let err = read_log(Cursor::new(raw)).unwrap_err();
        assert!(err.to_string().contains("negative frame length"));
    }
}
