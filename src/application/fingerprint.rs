//! One-way hashing of client identifiers (IP address, user agent).

use sha2::{Digest, Sha256};

/// Identifying request metadata; only ever persisted as salted hashes.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn ip_hash(&self, salt: &str) -> Option<String> {
        fingerprint(salt, self.ip.as_deref())
    }

    pub fn user_agent_hash(&self, salt: &str) -> Option<String> {
        fingerprint(salt, self.user_agent.as_deref())
    }

    /// Key for per-client budgets. Clients without a known address share one
    /// bucket instead of escaping the limit.
    pub fn rate_key(&self, salt: &str) -> String {
        self.ip_hash(salt)
            .or_else(|| fingerprint(salt, Some(UNKNOWN_CLIENT)))
            .unwrap_or_default()
    }
}

const UNKNOWN_CLIENT: &str = "unknown-client";

/// Salted SHA-256 of `value`, hex encoded. Blank input yields `None`.
pub fn fingerprint(salt: &str, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    Some(hex::encode(hasher.finalize()))
}
