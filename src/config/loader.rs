//! Configuration loader with tier-based merging.
//!
//! Discovers configuration sources, parses them and feeds them to a
//! [`ConfigurationBuilder`] in precedence order (lowest first):
//!
//! 1. `SYSTEM` and `ENV` fragments captured from the process
//! 2. Embedded defaults
//! 3. Extension fragments (`*.yaml` in the extensions directory, by name)
//! 4. Custom files, in the order given
//! 5. `<app>.yaml` in the working directory
//! 6. The explicitly specified file (`.yaml`, `.yml` or `.properties`)
//! 7. `<app>.yaml` in the user directory (`~/<app>/`)

use super::builder::ConfigurationBuilder;
use super::configuration::Configuration;
use super::parse::SourceFormat;
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Defaults compiled into the binary.
pub const DEFAULTS_YAML: &str = include_str!("../../config/defaults.yaml");

/// Environment variable naming an explicit override file.
pub const CONFIG_FILE_ENV: &str = "LAYERED_CONFIG_FILE";

/// Application name used for file names when none is given.
pub const DEFAULT_APP_NAME: &str = "layered-config";

/// Top-level key holding system properties.
pub const SYSTEM_NODE: &str = "SYSTEM";

/// Top-level key holding environment variables.
pub const ENV_NODE: &str = "ENV";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Process facts and `-D` properties
    System = 0,
    /// Environment variables
    Environment = 1,
    /// Embedded defaults
    Defaults = 2,
    /// Extension fragments
    Extensions = 3,
    /// Custom files
    Custom = 4,
    /// Working directory override
    WorkingDir = 5,
    /// Explicitly specified file
    Explicit = 6,
    /// User home override
    User = 7,
    /// Programmatic overrides added after all files
    Programmatic = 8,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::System => write!(f, "system"),
            ConfigTier::Environment => write!(f, "environment"),
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Extensions => write!(f, "extensions"),
            ConfigTier::Custom => write!(f, "custom"),
            ConfigTier::WorkingDir => write!(f, "working-dir"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A named configuration fragment contributed by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub tier: ConfigTier,
    pub tree: Map<String, Value>,
}

impl Layer {
    pub fn new(name: impl Into<String>, tier: ConfigTier, tree: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            tier,
            tree,
        }
    }
}

/// A source that was merged, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub name: String,
    pub tier: ConfigTier,
}

/// Where to look for each tier.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Base name for override files (`<app>.yaml`)
    pub app_name: String,
    /// Directory of extension fragments
    pub extensions_dir: Option<PathBuf>,
    /// Custom files, merged in order
    pub custom_files: Vec<PathBuf>,
    /// Directory searched for `<app>.yaml`
    pub working_dir: Option<PathBuf>,
    /// Explicit override file; format sniffed from its extension
    pub explicit_file: Option<PathBuf>,
    /// User config directory, searched for `<app>.yaml`
    pub user_dir: Option<PathBuf>,
    /// Also load `<name>-test.yaml` after every `<name>.yaml` that is loaded
    pub test_overlays: bool,
}

impl ConfigPaths {
    /// Discover configuration paths from the process environment.
    pub fn discover(app_name: &str) -> Self {
        let explicit_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        let working_dir = std::env::current_dir().ok();
        let user_dir = dirs::home_dir().map(|home| home.join(app_name));
        let extensions_dir = working_dir
            .as_ref()
            .map(|dir| dir.join(format!("{app_name}.d")));

        Self {
            app_name: app_name.to_string(),
            extensions_dir,
            custom_files: Vec::new(),
            working_dir,
            explicit_file,
            user_dir,
            test_overlays: false,
        }
    }

    /// Create paths with explicit directories and nothing else.
    pub fn with_dirs(
        app_name: &str,
        working_dir: Option<PathBuf>,
        user_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            working_dir,
            user_dir,
            ..Self::default()
        }
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    pub fn with_extensions_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.extensions_dir = Some(path.into());
        self
    }

    pub fn with_custom_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_files.push(path.into());
        self
    }

    pub fn with_test_overlays(mut self, enabled: bool) -> Self {
        self.test_overlays = enabled;
        self
    }

    fn override_file_name(&self) -> String {
        format!("{}.yaml", self.app_name)
    }
}

/// Process state captured once at load time.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    pub system_properties: Vec<(String, String)>,
    pub environment: Vec<(String, String)>,
}

impl ProcessSnapshot {
    /// Capture the current process environment and system facts.
    ///
    /// `extra_properties` are `-D key=value` style properties; they win over
    /// the built-in facts.
    pub fn capture(app_name: &str, extra_properties: &[(String, String)]) -> Self {
        let mut system_properties = vec![
            ("app.name".to_string(), app_name.to_string()),
            (
                "app.version".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
            ("os.name".to_string(), std::env::consts::OS.to_string()),
            ("os.arch".to_string(), std::env::consts::ARCH.to_string()),
            ("os.family".to_string(), std::env::consts::FAMILY.to_string()),
        ];
        if let Ok(dir) = std::env::current_dir() {
            system_properties.push(("user.dir".to_string(), dir.display().to_string()));
        }
        if let Some(home) = dirs::home_dir() {
            system_properties.push(("user.home".to_string(), home.display().to_string()));
        }
        system_properties.extend(extra_properties.iter().cloned());

        Self {
            system_properties,
            environment: std::env::vars().collect(),
        }
    }
}

/// Loads layered configuration sources into a builder.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    builder: ConfigurationBuilder,
    sources: Vec<LoadedSource>,
    warnings: Vec<String>,
}

impl ConfigLoader {
    /// Load from discovered paths and the live process state.
    pub fn load(app_name: &str) -> ConfigResult<Self> {
        let paths = ConfigPaths::discover(app_name);
        Self::load_with(paths, ProcessSnapshot::capture(app_name, &[]))
    }

    /// Load with explicit paths and a captured process snapshot.
    pub fn load_with(paths: ConfigPaths, process: ProcessSnapshot) -> ConfigResult<Self> {
        let mut loader = Self {
            paths,
            builder: ConfigurationBuilder::new(),
            sources: Vec::new(),
            warnings: Vec::new(),
        };

        loader
            .builder
            .add_system_properties(SYSTEM_NODE, process.system_properties);
        loader.record(SYSTEM_NODE, ConfigTier::System);
        loader
            .builder
            .add_environment_variables(ENV_NODE, process.environment);
        loader.record(ENV_NODE, ConfigTier::Environment);

        loader.load_text("<defaults>", DEFAULTS_YAML, SourceFormat::Yaml, ConfigTier::Defaults)?;

        for file in loader.extension_files()? {
            loader.load_yaml_file(&file, ConfigTier::Extensions)?;
        }

        for file in loader.paths.custom_files.clone() {
            loader.load_yaml_file(&file, ConfigTier::Custom)?;
        }

        if let Some(dir) = loader.paths.working_dir.clone() {
            let file = dir.join(loader.paths.override_file_name());
            loader.load_yaml_file(&file, ConfigTier::WorkingDir)?;
        }

        if let Some(file) = loader.paths.explicit_file.clone() {
            loader.load_explicit(&file)?;
        }

        if let Some(dir) = loader.paths.user_dir.clone() {
            let file = dir.join(loader.paths.override_file_name());
            loader.load_yaml_file(&file, ConfigTier::User)?;
        }

        Ok(loader)
    }

    /// Extension fragments, sorted by file name.
    fn extension_files(&self) -> ConfigResult<Vec<PathBuf>> {
        let Some(dir) = self.paths.extensions_dir.as_ref() else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| SourceFormat::from_path(path) == Some(SourceFormat::Yaml))
            .filter(|path| !is_test_overlay(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load a YAML file if it exists, followed by its test overlay if enabled.
    fn load_yaml_file(&mut self, path: &Path, tier: ConfigTier) -> ConfigResult<()> {
        self.load_file_if_exists(path, SourceFormat::Yaml, tier)?;
        if self.paths.test_overlays
            && let Some(overlay) = test_overlay_path(path)
        {
            self.load_file_if_exists(&overlay, SourceFormat::Yaml, tier)?;
        }
        Ok(())
    }

    /// Unlike the other override files, a missing explicit file is reported
    /// as a warning.
    fn load_explicit(&mut self, path: &Path) -> ConfigResult<()> {
        if !path.is_file() {
            self.warn(format!("Configuration file not found: {}", path.display()));
            return Ok(());
        }
        match SourceFormat::from_path(path) {
            Some(format) => {
                self.load_file_if_exists(path, format, ConfigTier::Explicit)?;
                if format == SourceFormat::Yaml
                    && self.paths.test_overlays
                    && let Some(overlay) = test_overlay_path(path)
                {
                    self.load_file_if_exists(&overlay, format, ConfigTier::Explicit)?;
                }
                Ok(())
            }
            None => {
                self.warn(format!("Unknown configuration filetype: {}", path.display()));
                Ok(())
            }
        }
    }

    fn load_file_if_exists(
        &mut self,
        path: &Path,
        format: SourceFormat,
        tier: ConfigTier,
    ) -> ConfigResult<()> {
        if !path.is_file() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.display().to_string();
        self.load_text(&name, &content, format, tier)
    }

    fn load_text(
        &mut self,
        name: &str,
        content: &str,
        format: SourceFormat,
        tier: ConfigTier,
    ) -> ConfigResult<()> {
        let tree = format.parse(content, name)?;
        self.builder.add_layer(Layer::new(name, tier, tree));
        info!(source = %name, tier = %tier, format = %format, "Loaded configuration");
        self.record(name, tier);
        Ok(())
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn record(&mut self, name: &str, tier: ConfigTier) {
        self.sources.push(LoadedSource {
            name: name.to_string(),
            tier,
        });
    }

    /// Add a programmatic override at a dotted path, after all file layers.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<&mut Self> {
        self.builder.add(path, value)?;
        self.record(path, ConfigTier::Programmatic);
        Ok(self)
    }

    /// Sources merged so far, lowest precedence first.
    pub fn sources(&self) -> &[LoadedSource] {
        &self.sources
    }

    /// Non-fatal problems encountered while loading.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The unresolved builder.
    pub fn builder(&self) -> &ConfigurationBuilder {
        &self.builder
    }

    /// Consume the loader and return the builder for further extension.
    pub fn into_builder(self) -> ConfigurationBuilder {
        self.builder
    }

    /// Resolve all references and return the final configuration.
    pub fn build(self) -> ConfigResult<Configuration> {
        self.builder.build()
    }
}

/// `dir/app.yaml` -> `dir/app-test.yaml`.
fn test_overlay_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path.extension()?.to_str()?;
    Some(path.with_file_name(format!("{stem}-test.{extension}")))
}

fn is_test_overlay(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with("-test"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(env: &[(&str, &str)]) -> ProcessSnapshot {
        ProcessSnapshot {
            system_properties: vec![("user.dir".into(), "/work".into())],
            environment: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_config_paths_discover() {
        let paths = ConfigPaths::discover("demo");
        assert_eq!(paths.app_name, "demo");
        assert!(paths.working_dir.is_some());
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            "app",
            Some(temp.path().join("work")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with(paths, snapshot(&[])).unwrap();
        assert!(loader.warnings().is_empty());
        let tiers: Vec<ConfigTier> = loader.sources().iter().map(|s| s.tier).collect();
        assert_eq!(
            tiers,
            vec![ConfigTier::System, ConfigTier::Environment, ConfigTier::Defaults]
        );

        let config = loader.build().unwrap();
        assert_eq!(config.get_str("SYSTEM.user_dir"), Some("/work"));
        assert_eq!(config.get_str("home"), Some("/work"));
    }

    #[test]
    fn test_user_overrides_working_dir() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        let user = temp.path().join("user");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        std::fs::write(work.join("app.yaml"), "server:\n  port: 1\n  host: w\n").unwrap();
        std::fs::write(user.join("app.yaml"), "server:\n  port: 2\n").unwrap();

        let paths = ConfigPaths::with_dirs("app", Some(work), Some(user));
        let config = ConfigLoader::load_with(paths, snapshot(&[]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.get_i64("server.port"), Some(2));
        assert_eq!(config.get_str("server.host"), Some("w"));
    }

    #[test]
    fn test_unknown_explicit_format_is_warning() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("settings.toml");
        std::fs::write(&file, "a = 1").unwrap();

        let paths = ConfigPaths::with_dirs("app", None, None).with_explicit_file(&file);
        let loader = ConfigLoader::load_with(paths, snapshot(&[])).unwrap();
        assert_eq!(loader.warnings().len(), 1);
        assert!(loader.warnings()[0].contains("settings.toml"));
        assert!(loader.build().unwrap().get("a").is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_warning() {
        let paths = ConfigPaths::with_dirs("app", None, None)
            .with_explicit_file("/definitely/not/here.yaml");
        let loader = ConfigLoader::load_with(paths, snapshot(&[])).unwrap();
        assert_eq!(loader.warnings().len(), 1);
        assert!(loader.warnings()[0].contains("not found"));
        assert!(
            loader
                .sources()
                .iter()
                .all(|s| s.tier != ConfigTier::Explicit)
        );
    }

    #[test]
    fn test_missing_optional_files_are_silent() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            "app",
            Some(temp.path().join("work")),
            Some(temp.path().join("user")),
        )
        .with_custom_file(temp.path().join("absent.yaml"));
        let loader = ConfigLoader::load_with(paths, snapshot(&[])).unwrap();
        assert!(loader.warnings().is_empty());
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.yaml"), "a: [broken").unwrap();
        let paths = ConfigPaths::with_dirs("app", Some(temp.path().to_path_buf()), None);
        let err = ConfigLoader::load_with(paths, snapshot(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_test_overlay_path() {
        assert_eq!(
            test_overlay_path(Path::new("/a/app.yaml")),
            Some(PathBuf::from("/a/app-test.yaml"))
        );
        assert!(is_test_overlay(Path::new("x/base-test.yaml")));
        assert!(!is_test_overlay(Path::new("x/base.yaml")));
    }
}
