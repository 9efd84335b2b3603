pub mod config;
pub mod error;
pub mod types;

pub use config::{ClientIdentity, Config};
pub use error::EngagerError;
pub use types::*;
