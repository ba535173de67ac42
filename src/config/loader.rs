//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::PseudoServiceConfig;
use super::secret::secret_string;
use crate::domain::errors::PseudoError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into PseudoServiceConfig
/// 4. Applies environment variable overrides (PSEUDO_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use pseudo_service::config::loader::load_config;
///
/// let config = load_config("pseudo.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<PseudoServiceConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(PseudoError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        PseudoError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: PseudoServiceConfig = toml::from_str(&contents)
        .map_err(|e| PseudoError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        PseudoError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| PseudoError::Configuration(e.to_string()))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(PseudoError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using PSEUDO_* prefix
///
/// Environment variables follow the pattern: PSEUDO_<SECTION>_<KEY>
/// For example: PSEUDO_APPLICATION_LOG_LEVEL, PSEUDO_SID_INDEX_PATH
fn apply_env_overrides(config: &mut PseudoServiceConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("PSEUDO_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("PSEUDO_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("PSEUDO_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("PSEUDO_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    // Cache overrides
    if let Ok(val) = std::env::var("PSEUDO_CACHE_PSEUDO_FUNCS_MAX_ENTRIES") {
        if let Ok(max) = val.parse() {
            config.cache.pseudo_funcs_max_entries = max;
        }
    }
    if let Ok(val) = std::env::var("PSEUDO_CACHE_AEAD_MAX_ENTRIES") {
        if let Ok(max) = val.parse() {
            config.cache.aead_max_entries = max;
        }
    }
    if let Ok(val) = std::env::var("PSEUDO_CACHE_AEAD_TTL_SECONDS") {
        if let Ok(ttl) = val.parse() {
            config.cache.aead_ttl_seconds = ttl;
        }
    }

    // SID overrides
    if let Ok(val) = std::env::var("PSEUDO_SID_INDEX_PATH") {
        config.sid.get_or_insert_with(Default::default).index_path = Some(PathBuf::from(val));
    }

    // KEK material override for a single configured KEK
    if let Ok(val) = std::env::var("PSEUDO_KEK_MATERIAL") {
        if let [kek] = config.keks.as_mut_slice() {
            kek.material = secret_string(val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("PSEUDO_TEST_VAR", "test_value");
        let input = "material = \"${PSEUDO_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "material = \"test_value\"");
        std::env::remove_var("PSEUDO_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("PSEUDO_MISSING_VAR");
        let input = "material = \"${PSEUDO_MISSING_VAR}\"";
        assert!(substitute_env_vars(input).is_err());
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("PSEUDO_COMMENTED_VAR");
        let input = "# material = \"${PSEUDO_COMMENTED_VAR}\"";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("nonexistent.toml").is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[cache]
pseudo_funcs_max_entries = 10

[[keks]]
uri = "local-kek://pseudo/main"
material = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE="

[[secrets]]
id = "legacy"
material = "AgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgI="
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.cache.pseudo_funcs_max_entries, 10);
        assert_eq!(config.cache.aead_max_entries, 2000);
        assert_eq!(config.keks[0].uri, "local-kek://pseudo/main");
        assert_eq!(config.secrets[0].id, "legacy");
        assert!(config.secrets[0].material.expose_secret().as_ref().starts_with("AgIC"));
    }

    #[test]
    fn test_load_config_invalid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[[keks]]\nuri = \"local-kek://pseudo/main\"\nmaterial = \"AQID\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
