pub mod document;
pub mod error;

pub use document::Config;
pub use error::ConfigError;
