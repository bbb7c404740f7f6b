/*
[ version   : u8  ]
[ count     : i32 ]
[ token_len : u16 ]
[ token     : [u8] ]  utf-8, at most MAX_TOKEN_LEN bytes
[ checksum  : u32 ]  xxh32 of everything above
*/

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use xxhash_rust::xxh32::xxh32;

use crate::error::DeserializeError;
use crate::utils::{read_array, read_bytes};

pub const RECORD_VERSION: u8 = 1;
pub const MAX_TOKEN_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 4 + 2;
const CHECKSUM_LEN: usize = 4;
pub const MAX_RECORD_LEN: usize = HEADER_LEN + MAX_TOKEN_LEN + CHECKSUM_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub count: i32,
    pub token: String,
}

impl ConfigRecord {
    /// Tokens longer than [`MAX_TOKEN_LEN`] bytes are cut at the last char
    /// boundary that fits.
    pub fn new(count: i32, token: &str) -> Self {
        Self {
            count,
            token: clamp_token(token).to_string(),
        }
    }

    pub fn serialize(&self) -> Bytes {
        let token = clamp_token(&self.token);
        let mut buf = BytesMut::with_capacity(HEADER_LEN + token.len() + CHECKSUM_LEN);
        buf.put_u8(RECORD_VERSION);
        buf.put_i32(self.count);
        buf.put_u16(token.len() as u16);
        buf.extend_from_slice(token.as_bytes());
        let checksum = xxh32(&buf, 0);
        buf.put_u32(checksum);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, DeserializeError> {
        let view = ConfigRecordView::parse(buf)?;
        Ok(Self {
            count: view.count,
            token: view.token.to_string(),
        })
    }
}

impl fmt::Display for ConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count: {} token: {}", self.count, self.token)
    }
}

/// Borrowed view of an encoded record. Parsing never allocates, so it is
/// safe to run where no heap is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRecordView<'a> {
    pub count: i32,
    pub token: &'a str,
}

impl<'a> ConfigRecordView<'a> {
    pub fn parse(whole: &'a [u8]) -> Result<Self, DeserializeError> {
        let mut buf = whole;

        let [version] = read_array::<1>(&mut buf)?;
        if version != RECORD_VERSION {
            return Err(DeserializeError::UnsupportedVersion(version));
        }
        let count = i32::from_be_bytes(read_array::<4>(&mut buf)?);
        let token_len = u16::from_be_bytes(read_array::<2>(&mut buf)?) as usize;
        if token_len > MAX_TOKEN_LEN {
            return Err(DeserializeError::TokenTooLong(token_len));
        }
        let token_bytes = read_bytes(&mut buf, token_len)?;

        let body_len = whole.len() - buf.len();
        let expected = u32::from_be_bytes(read_array::<4>(&mut buf)?);
        if !buf.is_empty() {
            return Err(DeserializeError::TrailingBytes(buf.len()));
        }
        let found = xxh32(&whole[..body_len], 0);
        if found != expected {
            return Err(DeserializeError::ChecksumMismatch { expected, found });
        }

        let token = std::str::from_utf8(token_bytes).map_err(|_| DeserializeError::InvalidUtf8)?;
        Ok(Self { count, token })
    }
}

/// Content check for config records, suitable for the isolated validator.
pub fn is_valid_record(data: &[u8]) -> bool {
    ConfigRecordView::parse(data).is_ok()
}

fn clamp_token(token: &str) -> &str {
    if token.len() <= MAX_TOKEN_LEN {
        return token;
    }
    let mut end = MAX_TOKEN_LEN;
    while !token.is_char_boundary(end) {
        end -= 1;
    }
    &token[..end]
}
