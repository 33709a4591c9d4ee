//! Domain layer types and invariants.

pub mod blocks;
pub mod entities;
pub mod error;
pub mod hostname;
pub mod seo;
pub mod slug;
pub mod spam;
pub mod types;
