//! KDL settings parsing for Conveyor.
//!
//! Settings live in `conveyor.kdl`; every key is optional.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{Settings, load_settings, parse_settings, validate_project_prefix};
