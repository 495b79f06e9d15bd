//! Anti-forgery tokens
//!
//! A token is a keyed SHA-256 digest over the time tick, the scope and the
//! caller's identity. It is valid during the tick it was issued in and the
//! one after, so a link stays usable for between half a lifetime and a full
//! lifetime.

use sha2::{Digest, Sha256};

use super::Caller;

/// Hex characters kept from the digest.
const TOKEN_LEN: usize = 24;

/// Issues and verifies scope-bound tokens.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    secret: String,
    lifetime_secs: u64,
}

/// Which tick a valid token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAge {
    /// Issued during the current tick.
    Current,
    /// Issued during the previous tick.
    Previous,
}

impl TokenAuthority {
    /// Create an authority with a site secret and a token lifetime
    ///
    /// Lifetimes under two seconds are raised to two so a tick is never zero.
    pub fn new(secret: impl Into<String>, lifetime_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            lifetime_secs: lifetime_secs.max(2),
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    fn tick(&self, now_secs: u64) -> u64 {
        now_secs.div_ceil(self.lifetime_secs / 2)
    }

    fn digest(&self, tick: u64, scope: &str, caller: &Caller) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update([0u8]);
        hasher.update(tick.to_be_bytes());
        hasher.update(scope.as_bytes());
        hasher.update([0u8]);
        hasher.update(caller.user_id.to_be_bytes());
        hasher.update(caller.session.as_bytes());
        let mut token = hex::encode(hasher.finalize());
        token.truncate(TOKEN_LEN);
        token
    }

    /// Issue a token for `scope`, bound to the caller's user id and session.
    pub fn issue(&self, caller: &Caller, scope: &str, now_secs: u64) -> String {
        self.digest(self.tick(now_secs), scope, caller)
    }

    /// Check a token; `None` when it is empty, expired or bound elsewhere.
    pub fn verify(&self, token: &str, caller: &Caller, scope: &str, now_secs: u64) -> Option<TokenAge> {
        if token.is_empty() {
            return None;
        }

        let tick = self.tick(now_secs);
        if constant_time_eq(token, &self.digest(tick, scope, caller)) {
            return Some(TokenAge::Current);
        }
        if tick > 0 && constant_time_eq(token, &self.digest(tick - 1, scope, caller)) {
            return Some(TokenAge::Previous);
        }
        None
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
