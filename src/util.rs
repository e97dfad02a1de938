//! Shared utility modules used across Augur components.

pub mod fs;
