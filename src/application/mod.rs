//! Application services layer.

pub mod analytics;
pub mod audit;
pub mod dns;
pub mod domains;
pub mod error;
pub mod fingerprint;
pub mod forms;
pub mod public;
pub mod repos;
pub mod sanitizer;
pub mod templates;
pub mod website;
