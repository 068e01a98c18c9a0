pub mod cli;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cli::{Cli, run};
pub use config::PydescConfig;
pub use error::{Error, Result};
