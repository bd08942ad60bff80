//! Core types for the Visiora event pipeline.

pub mod error;
pub mod event;
pub mod records;
pub mod traffic;

pub use error::{Error, Result};
pub use event::*;
pub use records::*;
