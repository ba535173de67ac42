//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIG, EXIT_FATAL};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "pseudo.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing pseudo service configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Create a .env file with your key material:");
                println!("     - PSEUDO_KEK_MATERIAL (base64, 32 bytes)");
                println!("     - PSEUDO_SECRET_COMMON_KEY_1 (base64, 32 or 64 bytes), if used");
                println!("  2. Validate configuration: pseudo-service validate-config");
                println!("  3. Generate a keyset: pseudo-service generate-keyset -o keyset.json");
                println!("  4. Pseudonymize: pseudo-service pseudonymize-field -r request.json");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Pseudo Service Configuration File

[application]
log_level = "info"

[logging]
local_enabled = false
local_path = "./logs"
local_rotation = "daily"

[cache]
pseudo_funcs_max_entries = 1000
aead_max_entries = 2000
aead_ttl_seconds = 120

[[keks]]
uri = "local-kek://pseudo/main"
material = "${PSEUDO_KEK_MATERIAL}"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Pseudo Service Configuration File
#
# This file contains all configuration options with examples and explanations.
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any setting can also be overridden with PSEUDO_<SECTION>_<KEY>.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Write JSON logs to a rolling file in addition to stderr
local_enabled = false

# Directory for log files
local_path = "./logs"

# Log rotation (daily, hourly or never)
local_rotation = "daily"

# ============================================================================
# Cache Configuration
# ============================================================================
[cache]
# Function sets kept for reuse across requests
pseudo_funcs_max_entries = 1000

# Resolved key encryption keys kept for reuse
aead_max_entries = 2000

# Lifetime of a resolved key encryption key in seconds
aead_ttl_seconds = 120

# ============================================================================
# Key Encryption Keys
# ============================================================================
# Keysets in requests are wrapped by one of these keys. Material is base64
# encoded and must be 32 bytes.
[[keks]]
uri = "local-kek://pseudo/main"
material = "${PSEUDO_KEK_MATERIAL}"

# ============================================================================
# Named Secrets
# ============================================================================
# Key material referenced directly by keyId, e.g. fpe(keyId=ssb-common-key-1, alphabet=digits).
# Material is base64 encoded, 32 or 64 bytes.
# [[secrets]]
# id = "ssb-common-key-1"
# material = "${PSEUDO_SECRET_COMMON_KEY_1}"

# ============================================================================
# SID Index
# ============================================================================
# Required by map-sid, map-sid-ff31 and map-sid-daead.
# [sid]
# index_path = "./sid-index.json"
"#
        .to_string()
    }
}
