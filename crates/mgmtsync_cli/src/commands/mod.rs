//! CLI command implementations.

pub mod apply;
pub mod certificate;
pub mod manage;
pub mod wait;
