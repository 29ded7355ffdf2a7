//! Body-composition dashboard core: tolerant sheet ingestion plus the
//! derived metrics and cycle advisory rendered from it.

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logging;
pub mod source;
pub mod table;
