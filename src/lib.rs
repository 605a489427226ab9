// ABOUTME: Library root for dockutil - resilient Docker daemon access for agents.
// ABOUTME: The dockutil binary in main.rs is a thin shell over these modules.

pub mod config;
pub mod docker;
pub mod error;
pub mod types;
