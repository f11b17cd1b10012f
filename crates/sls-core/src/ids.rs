//! Synthetic identifiers.

use std::fmt;

use rand::Rng;
use serde::Serialize;

/// Process-wide API identifier.
///
/// Generated once at startup and shared read-only by every synthesized
/// event; never regenerated per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ApiId(String);

impl ApiId {
    /// 4 random bytes as 8 lowercase hex characters.
    pub fn generate() -> Self {
        Self(random_hex::<4>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fresh 128-bit random request identifier (UUID v4).
pub fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fresh log-stream discriminator: 16 random bytes as 32 hex characters.
pub fn stream_id() -> String {
    random_hex::<16>()
}

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}
