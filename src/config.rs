//! Configuration management for the ballot box
//!
//! Loads storage locations, voting rules and the identity salt from
//! environment variables (optionally via a `.env` file) with validation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the state files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding all state files
    pub data_dir: PathBuf,

    /// Candidate list file name
    pub candidates_file: String,

    /// Combined votes + voter registry file name
    pub ballot_file: String,
}

impl StorageConfig {
    /// Full path of the candidates file
    pub fn candidates_path(&self) -> PathBuf {
        self.data_dir.join(&self.candidates_file)
    }

    /// Full path of the ballot document
    pub fn ballot_path(&self) -> PathBuf {
        self.data_dir.join(&self.ballot_file)
    }
}

/// Eligibility rules applied to each vote attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingRules {
    /// Minimum voter age (default: 18)
    pub minimum_age: u32,

    /// Maximum number of digits in an identity token (default: 10)
    pub identity_max_digits: usize,
}

impl Default for VotingRules {
    fn default() -> Self {
        Self {
            minimum_age: 18,
            identity_max_digits: 10,
        }
    }
}

/// Identity hashing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Optional identity salt (base64 encoded, minimum 32 bytes)
    ///
    /// Changing it after votes were recorded makes every stored digest
    /// unrecognisable, so returning voters would no longer be detected.
    pub identity_salt: Option<String>,
}

impl SecurityConfig {
    /// Create configuration for testing with a random salt
    pub fn for_testing() -> Self {
        use base64::Engine;
        let salt = base64::engine::general_purpose::STANDARD.encode(rand::random::<[u8; 32]>());

        Self {
            identity_salt: Some(salt),
        }
    }

    /// Validate a base64-encoded salt
    fn validate_salt(salt: &str, name: &str) -> Result<()> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(salt)
            .map_err(|_| Error::config(format!("{name} must be valid base64")))?;

        if decoded.len() < 32 {
            return Err(Error::config(format!(
                "{name} must be at least 32 bytes when decoded"
            )));
        }

        Ok(())
    }

    /// First 32 bytes of the decoded salt, if one is configured
    pub fn identity_key(&self) -> Result<Option<[u8; 32]>> {
        use base64::Engine;
        let Some(salt) = &self.identity_salt else {
            return Ok(None);
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(salt)
            .map_err(|_| Error::config("Invalid identity salt"))?;

        let key: [u8; 32] = decoded
            .get(..32)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| Error::config("Identity salt shorter than 32 bytes"))?;

        Ok(Some(key))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub rules: VotingRules,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = StorageConfig {
            data_dir: lookup("VOTEBOX_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            candidates_file: lookup("VOTEBOX_CANDIDATES_FILE")
                .unwrap_or_else(|| "candidatos.json".to_string()),
            ballot_file: lookup("VOTEBOX_BALLOT_FILE").unwrap_or_else(|| "urna.json".to_string()),
        };

        let defaults = VotingRules::default();
        let minimum_age = match lookup("VOTEBOX_MINIMUM_AGE") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::config("Invalid VOTEBOX_MINIMUM_AGE"))?,
            None => defaults.minimum_age,
        };

        let identity_max_digits = match lookup("VOTEBOX_IDENTITY_MAX_DIGITS") {
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|digits: &usize| *digits > 0)
                .ok_or_else(|| Error::config("Invalid VOTEBOX_IDENTITY_MAX_DIGITS"))?,
            None => defaults.identity_max_digits,
        };

        let identity_salt = lookup("VOTEBOX_IDENTITY_SALT").filter(|s| !s.is_empty());
        if let Some(salt) = &identity_salt {
            SecurityConfig::validate_salt(salt, "VOTEBOX_IDENTITY_SALT")?;
        }

        let logging = LoggingConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
        };

        Ok(Self {
            storage,
            rules: VotingRules {
                minimum_age,
                identity_max_digits,
            },
            security: SecurityConfig { identity_salt },
            logging,
        })
    }

    /// Create configuration for testing, rooted at `data_dir`
    pub fn for_testing(data_dir: impl AsRef<Path>) -> Self {
        Self {
            storage: StorageConfig {
                data_dir: data_dir.as_ref().to_path_buf(),
                candidates_file: "candidatos.json".to_string(),
                ballot_file: "urna.json".to_string(),
            },
            rules: VotingRules::default(),
            security: SecurityConfig::for_testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
