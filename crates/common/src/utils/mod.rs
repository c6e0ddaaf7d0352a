//! Common utility functions and helper macros
//!
//! - **[`macros`]**: state-name macros for fieldless enums
//! - **[`serde`]**: serialization helpers for configuration types

#[macro_use]
pub mod macros;
pub mod serde;

pub use self::serde::{duration_millis, saturating_millis};
