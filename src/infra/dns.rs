//! TXT lookups backed by the system resolver configuration.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{
    TokioAsyncResolver,
    error::{ResolveError, ResolveErrorKind},
    system_conf::read_system_conf,
};
use tracing::debug;

use crate::application::dns::{TxtLookup, TxtResolver};

use super::error::InfraError;

pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    pub fn from_system_conf(timeout: Duration) -> Result<Self, InfraError> {
        let (config, mut opts) = read_system_conf()
            .map_err(|err| InfraError::dns(format!("failed to read resolver config: {err}")))?;
        opts.timeout = timeout;
        opts.attempts = 2;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> TxtLookup {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => {
                let records: Vec<String> = lookup
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                            .collect::<String>()
                    })
                    .collect();
                debug!(
                    target = "vestry::dns",
                    name,
                    records = records.len(),
                    "txt lookup answered"
                );
                if records.is_empty() {
                    TxtLookup::NoRecords
                } else {
                    TxtLookup::Records(records)
                }
            }
            Err(err) => classify_error(&err),
        }
    }
}

fn classify_error(err: &ResolveError) -> TxtLookup {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => TxtLookup::NoRecords,
        _ => TxtLookup::Unavailable(err.to_string()),
    }
}
