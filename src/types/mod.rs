//! Credential Cache Types
//!
//! Data structures shared by the provider and its collaborators.

mod config;
mod credential;

pub use config::*;
pub use credential::*;
