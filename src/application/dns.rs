//! Port for the DNS lookups used by custom-domain verification.

use async_trait::async_trait;

/// Raw outcome of a TXT query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtLookup {
    Records(Vec<String>),
    /// The name exists without TXT data, or does not exist at all.
    NoRecords,
    /// The resolver could not give a definitive answer (timeout, SERVFAIL, I/O).
    Unavailable(String),
}

#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> TxtLookup;
}
