//! Layered configuration system.
//!
//! Layers are applied lowest precedence first:
//! 1. **System** - process facts and `-D` properties under `SYSTEM`
//! 2. **Environment** - environment variables under `ENV`
//! 3. **Defaults** - embedded at build time from `./config/defaults.yaml`
//! 4. **Extensions** - `*.yaml` fragments from the extensions directory
//! 5. **Custom** - extra files given by the caller
//! 6. **Working dir** - `$CWD/<app>.yaml`
//! 7. **Explicit** - `--config` or `LAYERED_CONFIG_FILE`
//! 8. **User** - `~/<app>/<app>.yaml`
//!
//! ## Merge Strategy
//! - Objects: deep merge key by key
//! - Scalars and arrays: replaced wholesale by the later layer
//!
//! ## References
//! After merging, `${a.b}` and `${a.b:-default}` in string values are
//! substituted. `${ENV.HOME}` and `${SYSTEM.user_dir}` reach the captured
//! process state.

mod builder;
mod configuration;
mod loader;
mod merge;
mod parse;
mod resolve;

pub use builder::ConfigurationBuilder;
pub use configuration::Configuration;
pub use loader::{
    CONFIG_FILE_ENV, ConfigLoader, ConfigPaths, ConfigTier, DEFAULT_APP_NAME, DEFAULTS_YAML,
    ENV_NODE, Layer, LoadedSource, ProcessSnapshot, SYSTEM_NODE,
};
pub use merge::{add, deep_merge, deep_merge_all, get_path, merge};
pub use parse::{SourceFormat, parse_properties, parse_yaml};
pub use resolve::{
    MAX_PASSES, VariableResolver, has_placeholders, references, resolve, resolve_against,
};
