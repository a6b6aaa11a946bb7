use crate::adapters::delimited::DelimitedFormat;
use crate::adapters::http::{HttpEncryptorSettings, DEFAULT_USER_AGENT};
use crate::core::encrypt::EncryptSettings;
use crate::core::matcher::{MatchOutputs, MatchSettings};
use crate::core::retry::RetryPolicy;
use crate::core::shard::ShardSettings;
use crate::utils::encoding::TextEncoding;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_required_field,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Settings for every job, loaded from a TOML file. All sections are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub files: FilesConfig,
    pub encrypt: EncryptConfig,
    pub split: SplitConfig,
    #[serde(rename = "match")]
    pub matching: MatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub encoding: TextEncoding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptConfig {
    pub input: Option<String>,
    pub output: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_delay_ms: u64,
    pub checkpoint_every: usize,
    pub progress_every: usize,
    pub write_summary: bool,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: "encrypted_accounts.txt".to_string(),
            concurrency: 5,
            max_retries: 3,
            retry_delay_ms: 1000,
            request_delay_ms: 0,
            checkpoint_every: 100,
            progress_every: 10,
            write_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub input: Option<String>,
    pub parts: usize,
    pub output_dir: Option<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            input: None,
            parts: 5,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub reference: Option<String>,
    pub targets: Option<String>,
    pub output_dir: String,
    pub threshold: f64,
    pub password_length: usize,
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            reference: None,
            targets: None,
            output_dir: ".".to_string(),
            threshold: 0.51,
            password_length: 9,
            seed: None,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn format(&self) -> DelimitedFormat {
        DelimitedFormat::with_encoding(self.files.encoding)
    }

    pub fn http_settings(&self) -> Result<HttpEncryptorSettings> {
        self.api.validate()?;
        let endpoint = validate_required_field("api.endpoint", &self.api.endpoint)?;
        Ok(HttpEncryptorSettings {
            endpoint: endpoint.clone(),
            timeout: Duration::from_secs(self.api.timeout_seconds),
            user_agent: self.api.user_agent.clone(),
            headers: self.api.headers.clone(),
        })
    }

    pub fn encrypt_settings(&self) -> Result<EncryptSettings> {
        self.encrypt.validate()?;
        let input = validate_required_field("encrypt.input", &self.encrypt.input)?;
        let cfg = &self.encrypt;
        Ok(EncryptSettings {
            input: input.clone(),
            output: cfg.output.clone(),
            concurrency: cfg.concurrency,
            retry: RetryPolicy::new(cfg.max_retries, Duration::from_millis(cfg.retry_delay_ms)),
            request_delay: Duration::from_millis(cfg.request_delay_ms),
            checkpoint_every: cfg.checkpoint_every,
            progress_every: cfg.progress_every,
            write_summary: cfg.write_summary,
            format: self.format(),
        })
    }

    pub fn shard_settings(&self) -> Result<ShardSettings> {
        self.split.validate()?;
        let input = validate_required_field("split.input", &self.split.input)?;
        Ok(ShardSettings {
            input: input.clone(),
            parts: self.split.parts,
            output_dir: self.split.output_dir.clone(),
            format: self.format(),
        })
    }

    pub fn match_settings(&self) -> Result<MatchSettings> {
        self.matching.validate()?;
        let cfg = &self.matching;
        let reference = validate_required_field("match.reference", &cfg.reference)?;
        let targets = validate_required_field("match.targets", &cfg.targets)?;
        Ok(MatchSettings {
            reference: reference.clone(),
            targets: targets.clone(),
            output_dir: cfg.output_dir.clone(),
            threshold: cfg.threshold,
            password_length: cfg.password_length,
            seed: cfg.seed,
            outputs: MatchOutputs::default(),
            format: self.format(),
        })
    }
}

impl Validate for ApiConfig {
    fn validate(&self) -> Result<()> {
        let endpoint = validate_required_field("api.endpoint", &self.endpoint)?;
        validate_url("api.endpoint", endpoint)?;
        validate_positive_number("api.timeout_seconds", self.timeout_seconds as usize, 1)
    }
}

impl Validate for EncryptConfig {
    fn validate(&self) -> Result<()> {
        if let Some(input) = &self.input {
            validate_path("encrypt.input", input)?;
        }
        validate_path("encrypt.output", &self.output)?;
        validate_positive_number("encrypt.concurrency", self.concurrency, 1)?;
        validate_positive_number("encrypt.checkpoint_every", self.checkpoint_every, 1)?;
        validate_positive_number("encrypt.progress_every", self.progress_every, 1)?;
        if self.input.as_deref() == Some(self.output.as_str()) {
            return Err(EtlError::InvalidConfigValueError {
                field: "encrypt.output".to_string(),
                value: self.output.clone(),
                reason: "Output would overwrite the input file".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for SplitConfig {
    fn validate(&self) -> Result<()> {
        if let Some(input) = &self.input {
            validate_path("split.input", input)?;
        }
        if let Some(dir) = &self.output_dir {
            validate_path("split.output_dir", dir)?;
        }
        validate_positive_number("split.parts", self.parts, 1)
    }
}

impl Validate for MatchConfig {
    fn validate(&self) -> Result<()> {
        validate_path("match.output_dir", &self.output_dir)?;
        validate_range("match.threshold", self.threshold, 0.0, 1.0)?;
        validate_positive_number("match.password_length", self.password_length, 1)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        if self.api.endpoint.is_some() {
            self.api.validate()?;
        }
        self.encrypt.validate()?;
        self.split.validate()?;
        self.matching.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[api]
endpoint = "https://api.example.com/encrypt"
timeout_seconds = 20

[api.headers]
X-Channel = "batch"

[files]
encoding = "utf8"

[encrypt]
input = "part1.txt"
output = "part1_encrypted.txt"
concurrency = 8
max_retries = 2
retry_delay_ms = 250

[split]
input = "all.txt"
parts = 3

[match]
reference = "with_ids.txt"
targets = "without_ids.txt"
threshold = 0.6
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        let http = config.http_settings().unwrap();
        assert_eq!(http.timeout, Duration::from_secs(20));
        assert_eq!(http.headers.get("X-Channel").unwrap(), "batch");

        let encrypt = config.encrypt_settings().unwrap();
        assert_eq!(encrypt.concurrency, 8);
        assert_eq!(encrypt.retry.max_attempts(), 3);
        assert_eq!(encrypt.retry.delay, Duration::from_millis(250));
        assert_eq!(encrypt.checkpoint_every, 100);
        assert_eq!(encrypt.format.encoding, TextEncoding::Utf8);

        assert_eq!(config.shard_settings().unwrap().parts, 3);
        assert_eq!(config.match_settings().unwrap().threshold, 0.6);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.encrypt.concurrency, 5);
        assert_eq!(config.encrypt.max_retries, 3);
        assert_eq!(config.encrypt.retry_delay_ms, 1000);
        assert_eq!(config.split.parts, 5);
        assert_eq!(config.files.encoding, TextEncoding::Latin1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_endpoint_is_reported() {
        let config = AppConfig::from_toml_str("").unwrap();
        let err = config.http_settings().unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { ref field } if field == "api.endpoint"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ACCOUNT_ETL_TEST_ENDPOINT", "https://vault.example.com/enc");

        let config = AppConfig::from_toml_str(
            r#"
[api]
endpoint = "${ACCOUNT_ETL_TEST_ENDPOINT}"
"#,
        )
        .unwrap();
        assert_eq!(
            config.api.endpoint.as_deref(),
            Some("https://vault.example.com/enc")
        );

        std::env::remove_var("ACCOUNT_ETL_TEST_ENDPOINT");
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[api]
endpoint = "not-a-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[split]\nparts = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[match]\nthreshold = 1.5\n").unwrap();
        assert!(config.validate().is_err());

        let config =
            AppConfig::from_toml_str("[encrypt]\ninput = \"a.txt\"\noutput = \"a.txt\"\n").unwrap();
        assert!(config.encrypt_settings().is_err());
    }

    #[test]
    fn test_unparseable_toml() {
        let err = AppConfig::from_toml_str("[encrypt\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[split]\ninput = \"accounts.txt\"\nparts = 2\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.split.input.as_deref(), Some("accounts.txt"));
        assert_eq!(config.split.parts, 2);
    }
}
