//! API route modules.

pub mod recording;
