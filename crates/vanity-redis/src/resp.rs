//! RESP (REdis Serialization Protocol) values
//!
//! Encoding is used for requests, incremental decoding for replies.

/// Malformed RESP input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed resp: {0}")]
pub struct RespError(pub String);

/// RESP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple string (prefixed with +)
    SimpleString(String),
    /// Error message (prefixed with -)
    Error(String),
    /// 64-bit signed integer (prefixed with :)
    Integer(i64),
    /// Bulk string (prefixed with $, can be null)
    BulkString(Option<Vec<u8>>),
    /// Array of values (prefixed with *, can be null)
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Command as an array of bulk strings
    #[must_use]
    pub fn command(args: &[&[u8]]) -> Self {
        Self::Array(Some(
            args.iter()
                .map(|arg| Self::BulkString(Some(arg.to_vec())))
                .collect(),
        ))
    }

    /// Encode to wire format
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode into an existing buffer
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Self::Error(e) => {
                buf.push(b'-');
                buf.extend_from_slice(e.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Self::Integer(i) => {
                buf.push(b':');
                buf.extend_from_slice(i.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Self::BulkString(Some(data)) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Self::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
            Self::Array(Some(items)) => {
                buf.push(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
            Self::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    /// Decode one value from the front of `buf`
    ///
    /// Returns `Ok(None)` when `buf` holds only part of a value, otherwise
    /// the value and the number of bytes it occupied.
    ///
    /// # Errors
    /// `RespError` on an unknown type prefix or a malformed length.
    pub fn decode(buf: &[u8]) -> Result<Option<(Self, usize)>, RespError> {
        decode_at(buf, 0)
    }

    /// Bulk string payload
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Integer payload
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this is a null bulk string or array
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::BulkString(None) | Self::Array(None))
    }

    /// Whether this is `+OK`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::SimpleString(s) if s == "OK")
    }
}

fn decode_at(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(&prefix) = buf.get(pos) else {
        return Ok(None);
    };
    let Some(line_end) = find_crlf(buf, pos + 1) else {
        return Ok(None);
    };
    let line = &buf[pos + 1..line_end];
    let next = line_end + 2;

    match prefix {
        b'+' => Ok(Some((RespValue::SimpleString(utf8(line)?), next))),
        b'-' => Ok(Some((RespValue::Error(utf8(line)?), next))),
        b':' => Ok(Some((RespValue::Integer(integer(line)?), next))),
        b'$' => {
            let len = integer(line)?;
            if len < 0 {
                return Ok(Some((RespValue::BulkString(None), next)));
            }
            let len = usize::try_from(len).map_err(|_| RespError(format!("bad length {len}")))?;
            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(RespError("bulk string not terminated".to_string()));
            }
            Ok(Some((RespValue::BulkString(Some(buf[next..end].to_vec())), end + 2)))
        }
        b'*' => {
            let count = integer(line)?;
            if count < 0 {
                return Ok(Some((RespValue::Array(None), next)));
            }
            let mut items = Vec::new();
            let mut cursor = next;
            for _ in 0..count {
                match decode_at(buf, cursor)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(items)), cursor)))
        }
        other => Err(RespError(format!("unknown type prefix 0x{other:02x}"))),
    }
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|offset| from + offset)
}

fn utf8(line: &[u8]) -> Result<String, RespError> {
    String::from_utf8(line.to_vec()).map_err(|_| RespError("line is not utf-8".to_string()))
}

fn integer(line: &[u8]) -> Result<i64, RespError> {
    utf8(line)?
        .parse()
        .map_err(|_| RespError(format!("bad integer '{}'", String::from_utf8_lossy(line))))
}
