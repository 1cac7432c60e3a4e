use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration that merges CLI args, env vars, the config file,
/// and defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZettelsiteConfig {
    /// Build configuration
    pub build: BuildConfig,
    /// Site settings (from zettelsite-core)
    #[serde(flatten)]
    pub site: zettelsite_core::Settings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Source folder containing the zettelkasten
    pub source: String,
    /// Destination folder for the generated site
    pub output: String,
    /// Configuration file path
    pub config: String,
    /// Overwrite the theme files this run
    pub refresh_templates: bool,
    /// Approve all pending deletions without prompting
    pub assume_yes: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./zettelkasten".to_string(),
            output: "./site".to_string(),
            config: "./zettelsite.toml".to_string(),
            refresh_templates: false,
            assume_yes: false,
        }
    }
}

impl Default for ZettelsiteConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            site: zettelsite_core::Settings::default(),
        }
    }
}

impl ZettelsiteConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (ZETTELSITE_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .get_one::<String>("config")
            .unwrap_or(&"./zettelsite.toml".to_string())
            .clone();

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::with_name(&config_file.replace(".toml", "")));
        }

        // 3. Add environment variables with ZETTELSITE_ prefix
        builder = builder.add_source(
            Environment::with_prefix("ZETTELSITE")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides = std::collections::HashMap::new();

        if let Some(source) = args.get_one::<String>("source") {
            cli_overrides.insert("build.source".to_string(), source.clone());
        }
        if let Some(output) = args.get_one::<String>("output") {
            cli_overrides.insert("build.output".to_string(), output.clone());
        }
        if let Some(config) = args.get_one::<String>("config") {
            cli_overrides.insert("build.config".to_string(), config.clone());
        }
        // Flags are only defined on some subcommands
        if args.try_get_one::<bool>("refresh-templates").unwrap_or(None) == Some(&true) {
            cli_overrides.insert("build.refresh_templates".to_string(), "true".to_string());
        }
        if args.try_get_one::<bool>("yes").unwrap_or(None) == Some(&true) {
            cli_overrides.insert("build.assume_yes".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(config::Config::try_from(&cli_overrides)?);
        }

        // Build and deserialize
        let config = builder.build()?;
        let zettelsite_config: ZettelsiteConfig = config.try_deserialize()?;

        Ok(zettelsite_config)
    }
}

/// Load configuration specifically for build commands
pub fn load_build_config(args: &ArgMatches) -> Result<ZettelsiteConfig> {
    ZettelsiteConfig::load(args)
}
