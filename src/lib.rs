//! Layered configuration library
//!
//! Builds one resolved configuration tree from an ordered stack of layers.
//! Layers are deep-merged (objects merge, everything else is replaced by the
//! later layer), then `${path}` and `${path:-default}` references are
//! substituted across the whole tree.
//!
//! ```
//! use layered_config::config::ConfigurationBuilder;
//!
//! let mut builder = ConfigurationBuilder::new();
//! builder.add_yaml("greeting: Hello, ${name}\n")?;
//! builder.add_yaml("name: World\n")?;
//! let config = builder.build()?;
//! assert_eq!(config.get_str("greeting"), Some("Hello, World"));
//! # Ok::<(), layered_config::error::ConfigError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
