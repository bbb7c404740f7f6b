use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicU16;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Direction::Read => 0,
            Direction::Write => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Build-time declaration binding a compartment to one config item.
/// `max_size` only matters for write capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDecl {
    pub compartment: String,
    pub direction: Direction,
    pub item: String,
    #[serde(default)]
    pub max_size: usize,
}

impl CapabilityDecl {
    pub fn read(compartment: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            compartment: compartment.into(),
            direction: Direction::Read,
            item: item.into(),
            max_size: 0,
        }
    }

    pub fn write(compartment: impl Into<String>, item: impl Into<String>, max_size: usize) -> Self {
        Self {
            compartment: compartment.into(),
            direction: Direction::Write,
            item: item.into(),
            max_size,
        }
    }
}

/// Sealed contents of a capability. Only the authority that issued it can
/// verify it, and only the authority ever writes `identity`.
pub(crate) struct TokenBody {
    pub(crate) direction: Direction,
    pub(crate) item: Arc<str>,
    pub(crate) max_size: usize,
    pub(crate) nonce: u64,
    pub(crate) identity: AtomicU16, // 0 = not yet assigned
}

impl TokenBody {
    /*
    [ direction : u8  ]
    [ nonce     : u64 ]
    [ max_size  : u64 ]
    [ item_len  : u32 ]
    [ item      : [u8] ]
    */
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 + 8 + 4 + self.item.len());
        buf.push(self.direction.tag());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&(self.max_size as u64).to_be_bytes());
        buf.extend_from_slice(&(self.item.len() as u32).to_be_bytes());
        buf.extend_from_slice(self.item.as_bytes());
        buf
    }
}

/// Opaque capability handed to a compartment. There is no public way to
/// build one or to read its fields; see [`crate::TokenAuthority`].
#[derive(Clone)]
pub struct SealedToken {
    pub(crate) body: Arc<TokenBody>,
    pub(crate) seal: [u8; 32],
}

impl fmt::Debug for SealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedToken(#{})", self.body.nonce)
    }
}

/// Fields of a token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedToken {
    pub direction: Direction,
    pub item: Arc<str>,
    pub max_size: usize,
    pub identity: u16,
}
