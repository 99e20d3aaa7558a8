//! Shared wire definitions for the Huddle client socket protocol.

pub mod envelope;
pub mod frame;
pub mod taxonomy;
