//! Live data behind `dynamic_list` blocks: publish validation and hydration.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{RepoError, TenantDirectory};
use crate::application::website::error::BlockIssue;
use crate::domain::blocks::{Block, DynamicSource};

#[derive(Clone)]
pub struct DynamicContent {
    tenants: Arc<dyn TenantDirectory>,
}

impl DynamicContent {
    pub fn new(tenants: Arc<dyn TenantDirectory>) -> Self {
        Self { tenants }
    }

    /// Collect every dynamic block that would render empty.
    pub async fn validate(
        &self,
        tenant_id: Uuid,
        blocks: &[Block],
    ) -> Result<Vec<BlockIssue>, RepoError> {
        let mut issues = Vec::new();

        for block in blocks {
            let Some(settings) = block.dynamic_list() else {
                continue;
            };

            let Some(source_key) = settings.source_key() else {
                issues.push(BlockIssue {
                    block_id: block.id.clone(),
                    message: "dynamic list requires a source".to_string(),
                });
                continue;
            };

            let count = match settings.resolved_source() {
                Some(source) => self.count(tenant_id, source).await?,
                None => 0,
            };

            if count == 0 && !settings.has_usable_fallback() {
                issues.push(BlockIssue {
                    block_id: block.id.clone(),
                    message: format!(
                        "source `{source_key}` has no items and no fallback heading or body"
                    ),
                });
            }
        }

        Ok(issues)
    }

    /// Attach live items to every dynamic block. Lookup failures degrade to
    /// an empty list.
    pub async fn hydrate(&self, tenant_id: Uuid, blocks: &mut [Block]) {
        for block in blocks.iter_mut() {
            let Some(settings) = block.dynamic_list() else {
                continue;
            };
            let limit = settings.effective_limit();

            let items = match settings.resolved_source() {
                Some(DynamicSource::Sermons) | None => Vec::new(),
                Some(source) => self
                    .tenants
                    .list_items(tenant_id, source, limit)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(
                            target = "vestry::website::dynamic",
                            block_id = %block.id,
                            source = source.as_str(),
                            error = %err,
                            "dynamic block hydration failed"
                        );
                        Vec::new()
                    }),
            };

            block.resolved_items = Some(items.into_iter().take(limit).collect());
        }
    }

    async fn count(&self, tenant_id: Uuid, source: DynamicSource) -> Result<u64, RepoError> {
        match source {
            // No sermon store exists yet.
            DynamicSource::Sermons => Ok(0),
            other => self.tenants.count_items(tenant_id, other).await,
        }
    }
}
