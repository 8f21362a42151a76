//! The SASL `EXTERNAL` handshake that precedes the binary message stream
//! on every connection (§6.1, "wire protocol inherited").
//!
//! Unlike the rest of this crate, SASL runs once, blocking, directly on
//! the raw stream before a [`Transport`](crate::Transport) is handed off
//! to anything nonblocking — there is no steady-state reason to keep the
//! line-oriented negotiation logic around once `BEGIN` has been sent.

use std::io::{self, Read, Write};

use crate::error::{ErrorKind, Result};

/// Authenticate `stream` as `uid` using `AUTH EXTERNAL`, leaving it
/// positioned exactly after the server's final `OK` line — the next byte
/// read from `stream` is the first byte of the binary message stream.
pub(crate) fn authenticate_external<S: Read + Write>(stream: &mut S, uid: u32) -> Result<()> {
    stream.write_all(&[0])?;
    stream.write_all(format!("AUTH EXTERNAL {}\r\n", external_identity(uid)).as_bytes())?;
    stream.flush()?;

    let line = read_line(stream)?;
    if !line.starts_with("OK ") && line.trim_end() != "OK" {
        return Err(ErrorKind::InvalidSasl.at());
    }

    stream.write_all(b"BEGIN\r\n")?;
    stream.flush()?;
    Ok(())
}

/// Hex-encode the ASCII decimal digits of `uid`, the `EXTERNAL` mechanism's
/// way of smuggling a Unix uid through a command whose argument must
/// itself be a hex string (RFC 4422 `EXTERNAL`, as D-Bus profiles it).
fn external_identity(uid: u32) -> String {
    let digits = uid.to_string();
    let mut hex = String::with_capacity(digits.len() * 2);
    for byte in digits.as_bytes() {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Read a `\r\n`-terminated line one byte at a time.
///
/// A `BufReader` would over-read past the line into whatever the server
/// sends next — which, past `BEGIN`, is the start of a binary message and
/// must not be buffered away from the caller that reads it next.
fn read_line<S: Read>(stream: &mut S) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte)?;
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|e| e.utf8_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A mock stream with independent read and write buffers, unlike
    /// `Cursor<Vec<u8>>` which shares one position across both.
    struct MockStream {
        incoming: Cursor<Vec<u8>>,
        outgoing: Vec<u8>,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn identity_hex_encodes_decimal_uid() {
        assert_eq!(external_identity(1000), "31303030");
    }

    #[test]
    fn read_line_stops_at_crlf_without_consuming_more() {
        let mut cursor = Cursor::new(b"OK 1234deadbeef\r\nTRAILING".to_vec());
        let line = read_line(&mut cursor).unwrap();
        assert_eq!(line, "OK 1234deadbeef");
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"TRAILING");
    }

    #[test]
    fn full_handshake_sends_auth_then_begin() {
        let mut stream = MockStream {
            incoming: Cursor::new(b"OK 0123456789abcdef0123456789abcdef\r\n".to_vec()),
            outgoing: Vec::new(),
        };

        authenticate_external(&mut stream, 1000).unwrap();

        let sent = String::from_utf8(stream.outgoing).unwrap();
        assert_eq!(sent, "\0AUTH EXTERNAL 31303030\r\nBEGIN\r\n");
    }

    #[test]
    fn rejects_non_ok_response() {
        let mut stream = MockStream {
            incoming: Cursor::new(b"REJECTED EXTERNAL DBUS_COOKIE_SHA1\r\n".to_vec()),
            outgoing: Vec::new(),
        };

        assert!(authenticate_external(&mut stream, 1000).is_err());
    }
}
