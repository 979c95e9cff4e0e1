// crates/form-engine-config/src/config.rs
// ============================================================================
// Module: Form Engine Configuration
// Description: Configuration loading and validation for the form engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: form-engine-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. The file has four sections:
//! `[runtime]`, `[signing]`, `[build]`, and `[presets.<name>]`. Configured
//! presets are layered on top of the built-in `default` preset and may
//! inherit from it with `parentPreset = "default"`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use form_engine_core::ArrayFormFactory;
use form_engine_core::ConfigMap;
use form_engine_core::Ed25519StateSigner;
use form_engine_core::HiddenFieldTransport;
use form_engine_core::PresetResolver;
use form_engine_core::RuntimeConfig;
use form_engine_core::SupertypeResolver;
use form_engine_core::default_presets;
use form_engine_core::definition::FORM_ELEMENTS_DEFINITION_KEY;
use form_engine_core::runtime::factory::DEFAULT_PRESET;
use form_engine_core::runtime::transport::DEFAULT_STATE_FIELD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "form-engine.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FORM_ENGINE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum signing key file size in bytes.
const MAX_KEY_FILE_SIZE: usize = 1024;
/// Maximum hidden state field name length.
const MAX_FIELD_NAME_LENGTH: usize = 128;
/// Smallest accepted state blob limit.
const MIN_STATE_BYTES: usize = 1024;
/// Largest accepted state blob limit.
const MAX_STATE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Root configuration for hosts embedding the form engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormEngineConfig {
    /// Runtime limits and transport settings.
    #[serde(default)]
    pub runtime: RuntimeSettings,
    /// State signing key source.
    #[serde(default)]
    pub signing: SigningSettings,
    /// Form building defaults.
    #[serde(default)]
    pub build: BuildSettings,
    /// Additional presets keyed by name.
    #[serde(default)]
    pub presets: BTreeMap<String, Value>,
}

/// `[runtime]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeSettings {
    /// Hidden field carrying the signed state.
    pub state_field: String,
    /// Maximum signed state size in bytes.
    pub max_state_bytes: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            state_field: DEFAULT_STATE_FIELD.to_string(),
            max_state_bytes: RuntimeConfig::default().max_state_bytes,
        }
    }
}

impl RuntimeSettings {
    /// Validates runtime settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let field = self.state_field.as_str();
        if field.is_empty() || field.len() > MAX_FIELD_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "runtime.state_field must be 1-{MAX_FIELD_NAME_LENGTH} characters"
            )));
        }
        if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(ConfigError::Invalid(
                "runtime.state_field may only contain letters, digits, '_' and '-'".to_string(),
            ));
        }
        if !(MIN_STATE_BYTES ..= MAX_STATE_BYTES).contains(&self.max_state_bytes) {
            return Err(ConfigError::Invalid(format!(
                "runtime.max_state_bytes must be between {MIN_STATE_BYTES} and {MAX_STATE_BYTES}"
            )));
        }
        Ok(())
    }
}

/// `[signing]` section; exactly one key source must be set to sign state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SigningSettings {
    /// Environment variable holding a base64 seed.
    pub seed_env: Option<String>,
    /// File holding a raw or base64 seed.
    pub key_path: Option<PathBuf>,
}

impl SigningSettings {
    /// Validates signing settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_env.is_some() && self.key_path.is_some() {
            return Err(ConfigError::Invalid(
                "signing.seed_env and signing.key_path are mutually exclusive".to_string(),
            ));
        }
        if let Some(name) = &self.seed_env
            && name.trim().is_empty()
        {
            return Err(ConfigError::Invalid("signing.seed_env must be non-empty".to_string()));
        }
        if let Some(path) = &self.key_path {
            validate_path(path)?;
        }
        Ok(())
    }

    /// Reads the configured key material.
    fn key_material(&self) -> Result<Vec<u8>, ConfigError> {
        if let Some(name) = &self.seed_env {
            return env::var(name)
                .map(String::into_bytes)
                .map_err(|_| ConfigError::Invalid(format!("signing seed env var {name} is not set")));
        }
        if let Some(path) = &self.key_path {
            let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
            if bytes.len() > MAX_KEY_FILE_SIZE {
                return Err(ConfigError::Invalid("signing key file exceeds size limit".to_string()));
            }
            return Ok(bytes);
        }
        Err(ConfigError::Invalid("no signing key source configured".to_string()))
    }
}

/// `[build]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildSettings {
    /// Preset used when a caller names none.
    pub default_preset: String,
    /// Type keys filtered from introspection output.
    pub hidden_properties: Vec<String>,
    /// Include hidden keys in introspection output.
    pub show_hidden: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            default_preset: DEFAULT_PRESET.to_string(),
            hidden_properties: vec!["formEditor".to_string()],
            show_hidden: false,
        }
    }
}

// ============================================================================
// SECTION: Loading and Validation
// ============================================================================

impl FormEngineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then `FORM_ENGINE_CONFIG`, then
    /// `form-engine.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runtime.validate()?;
        self.signing.validate()?;
        for (name, preset) in &self.presets {
            if !preset.is_object() {
                return Err(ConfigError::Invalid(format!("presets.{name} must be a table")));
            }
        }
        let resolver = self.preset_resolver();
        if !resolver.contains(&self.build.default_preset) {
            return Err(ConfigError::Invalid(format!(
                "build.default_preset {} is not defined",
                self.build.default_preset
            )));
        }
        for name in resolver.presets().keys() {
            resolver.resolve(name).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Derived collaborators
    // ------------------------------------------------------------------------

    /// Returns the built-in presets overlaid with the configured ones.
    #[must_use]
    pub fn preset_resolver(&self) -> PresetResolver {
        let mut presets = default_presets();
        for (name, preset) in &self.presets {
            presets.insert(name.clone(), preset.clone());
        }
        PresetResolver::new(presets)
    }

    /// Returns a factory over [`Self::preset_resolver`].
    #[must_use]
    pub fn factory(&self) -> ArrayFormFactory {
        ArrayFormFactory::new(self.preset_resolver())
    }

    /// Returns the runtime limits.
    #[must_use]
    pub const fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_state_bytes: self.runtime.max_state_bytes,
        }
    }

    /// Returns the hidden field transport.
    #[must_use]
    pub fn transport(&self) -> HiddenFieldTransport {
        HiddenFieldTransport::new(self.runtime.state_field.clone())
    }

    /// Builds the state signer from the configured key source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no source is configured, the source cannot
    /// be read, or it does not hold a 32-byte seed.
    pub fn signer(&self) -> Result<Ed25519StateSigner, ConfigError> {
        let material = self.signing.key_material()?;
        Ed25519StateSigner::from_key_material(&material).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Resolves every type of `preset_name` for introspection.
    ///
    /// Hidden properties are removed unless `build.show_hidden` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the preset or a type fails to resolve.
    pub fn resolved_types(&self, preset_name: Option<&str>) -> Result<BTreeMap<String, ConfigMap>, ConfigError> {
        let name = preset_name.unwrap_or(&self.build.default_preset);
        let preset =
            self.preset_resolver().resolve(name).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let registry = match preset.get(FORM_ELEMENTS_DEFINITION_KEY) {
            Some(Value::Object(map)) => map.clone(),
            None => ConfigMap::new(),
            Some(_) => {
                return Err(ConfigError::Invalid(format!(
                    "presets.{name}.{FORM_ELEMENTS_DEFINITION_KEY} must be a table"
                )));
            }
        };
        SupertypeResolver::new(registry, self.build.hidden_properties.clone())
            .resolve_all(self.build.show_hidden)
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::MAX_PATH_COMPONENT_LENGTH;
    use super::MAX_TOTAL_PATH_LENGTH;
    use super::validate_path;

    /// Verifies ordinary relative paths pass.
    #[test]
    fn validate_path_accepts_regular_path() {
        assert!(validate_path(Path::new("./config/form-engine.toml")).is_ok());
    }

    /// Verifies empty paths are rejected.
    #[test]
    fn validate_path_rejects_empty_path() {
        assert!(validate_path(Path::new("")).is_err());
    }

    /// Verifies oversized path components are rejected.
    #[test]
    fn validate_path_rejects_long_component() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        assert!(validate_path(Path::new(&path)).is_err());
    }

    /// Verifies oversized total paths are rejected.
    #[test]
    fn validate_path_rejects_long_path() {
        let path = "a/".repeat(MAX_TOTAL_PATH_LENGTH / 2 + 1);
        assert!(validate_path(Path::new(&path)).is_err());
    }
}
