//! Vestry: versioned, multi-tenant website content for church communities.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
