use crate::core::error::BrokerError;
use crate::core::token::{AuthorizedToken, CapabilityDecl, Direction, SealedToken, TokenBody};
use rand::RngCore;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Issues and verifies capability tokens.
///
/// Tokens are sealed with a keyed BLAKE3 hash over their contents. The key
/// never leaves the authority, so a token is genuine only if this authority
/// sealed it and nothing about it changed since.
pub struct TokenAuthority {
    key: [u8; 32],
    next_identity: AtomicU32,
    next_nonce: AtomicU64,
}

impl Default for TokenAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenAuthority {
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::with_key(key)
    }

    pub fn with_key(key: [u8; 32]) -> Self {
        Self {
            key,
            next_identity: AtomicU32::new(1),
            next_nonce: AtomicU64::new(1),
        }
    }

    pub fn issue(&self, decl: &CapabilityDecl) -> Result<SealedToken, BrokerError> {
        if decl.item.is_empty() {
            return Err(BrokerError::InvalidDeclaration(format!(
                "empty item name for compartment {}",
                decl.compartment
            )));
        }
        if decl.direction == Direction::Write && decl.max_size == 0 {
            return Err(BrokerError::InvalidDeclaration(format!(
                "write capability for {} needs a max_size",
                decl.item
            )));
        }

        let body = TokenBody {
            direction: decl.direction,
            item: Arc::from(decl.item.as_str()),
            max_size: match decl.direction {
                Direction::Write => decl.max_size,
                Direction::Read => 0,
            },
            nonce: self.next_nonce.fetch_add(1, Ordering::Relaxed),
            identity: AtomicU16::new(0),
        };
        let seal = self.seal(&body);
        debug!(
            compartment = %decl.compartment,
            item = %decl.item,
            direction = %decl.direction,
            nonce = body.nonce,
            "issued capability"
        );
        Ok(SealedToken {
            body: Arc::new(body),
            seal,
        })
    }

    /// Verifies `token` and returns its fields, or `None` if it is not a
    /// token this authority sealed. The seal is always recomputed in full and
    /// compared in constant time, whatever is wrong with the token.
    pub fn authorize(&self, token: &SealedToken) -> Option<AuthorizedToken> {
        let expected = self.seal(&token.body);
        let genuine: bool = expected[..].ct_eq(&token.seal[..]).into();
        if !genuine {
            warn!(?token, "invalid config capability");
            return None;
        }

        let identity = self.assign_identity(&token.body)?;
        Some(AuthorizedToken {
            direction: token.body.direction,
            item: Arc::clone(&token.body.item),
            max_size: token.body.max_size,
            identity,
        })
    }

    fn seal(&self, body: &TokenBody) -> [u8; 32] {
        *blake3::keyed_hash(&self.key, &body.encode()).as_bytes()
    }

    fn assign_identity(&self, body: &TokenBody) -> Option<u16> {
        let current = body.identity.load(Ordering::Acquire);
        if current != 0 {
            return Some(current);
        }

        // racing first uses may each draw a number; only one is kept
        let drawn = self.next_identity.fetch_add(1, Ordering::Relaxed);
        let candidate = match u16::try_from(drawn) {
            Ok(id) if id != 0 => id,
            _ => {
                warn!(item = %body.item, "token identities exhausted");
                return None;
            }
        };

        match body
            .identity
            .compare_exchange(0, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(item = %body.item, identity = candidate, "assigned token identity");
                Some(candidate)
            }
            Err(existing) => Some(existing),
        }
    }
}
