//! Admin API handlers organized by resource.
//!
//! Every handler runs behind `require_tenant`, so the tenant and actor come
//! from the `TenantContext` extension.

mod analytics;
mod assets;
mod domains;
mod forms;
mod pages;
mod theme;
mod website;

pub use analytics::*;
pub use assets::*;
pub use domains::*;
pub use forms::*;
pub use pages::*;
pub use theme::*;
pub use website::*;

use serde::Deserialize;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub(crate) fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}
