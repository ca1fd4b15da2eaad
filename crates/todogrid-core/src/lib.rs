pub mod config;
pub mod validate;

pub use config::{LogFormat, ServerConfig};
pub use validate::{ValidationError, is_valid_field_key};
