// Configuration management module
// TOML settings, interactive setup, and the base directory layout

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, HOME_ENV_VAR, OllamaConfig, StoreConfig};
