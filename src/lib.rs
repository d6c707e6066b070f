#[cfg(feature = "cli")]
pub mod cli;
pub mod contexts;
pub mod core;
pub mod output;
pub mod util;

pub use crate::core::error::{ErrorKind, ProbeError};
pub use crate::core::model::{ArgumentSchema, Test, TestOptions};
pub use crate::core::registry::Registry;
pub use crate::core::traits::ProtocolTest;
