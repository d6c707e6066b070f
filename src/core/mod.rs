pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod tls;
pub mod traits;
