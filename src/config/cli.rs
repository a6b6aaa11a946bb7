use crate::config::toml_config::AppConfig;
use crate::utils::encoding::TextEncoding;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "account-etl")]
#[command(about = "Split, match and encrypt delimited account files")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Text encoding of input and output files
    #[arg(long, global = true, value_enum)]
    pub encoding: Option<TextEncoding>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Split a file into shards that can be encrypted in parallel
    Split(SplitArgs),
    /// Send every account to the encryption API
    Encrypt(EncryptArgs),
    /// Look up national IDs for accounts and build the encryption input
    Match(MatchArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SplitArgs {
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub parts: Option<usize>,

    #[arg(long)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct EncryptArgs {
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub output: Option<String>,

    /// Encryption API URL
    #[arg(long, env = "ACCOUNT_ETL_API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    #[arg(long)]
    pub request_delay_ms: Option<u64>,

    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct MatchArgs {
    /// File with national IDs
    #[arg(long)]
    pub reference: Option<String>,

    /// File of accounts to look up
    #[arg(long)]
    pub targets: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl SplitArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let split = &mut config.split;
        if self.input.is_some() {
            split.input = self.input.clone();
        }
        override_with(&mut split.parts, &self.parts);
        if self.output_dir.is_some() {
            split.output_dir = self.output_dir.clone();
        }
    }
}

impl EncryptArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if self.api_endpoint.is_some() {
            config.api.endpoint = self.api_endpoint.clone();
        }
        override_with(&mut config.api.timeout_seconds, &self.timeout_seconds);

        let encrypt = &mut config.encrypt;
        if self.input.is_some() {
            encrypt.input = self.input.clone();
        }
        override_with(&mut encrypt.output, &self.output);
        override_with(&mut encrypt.concurrency, &self.concurrency);
        override_with(&mut encrypt.max_retries, &self.max_retries);
        override_with(&mut encrypt.retry_delay_ms, &self.retry_delay_ms);
        override_with(&mut encrypt.request_delay_ms, &self.request_delay_ms);
        override_with(&mut encrypt.checkpoint_every, &self.checkpoint_every);
    }
}

impl MatchArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let matching = &mut config.matching;
        if self.reference.is_some() {
            matching.reference = self.reference.clone();
        }
        if self.targets.is_some() {
            matching.targets = self.targets.clone();
        }
        override_with(&mut matching.output_dir, &self.output_dir);
        override_with(&mut matching.threshold, &self.threshold);
        if self.seed.is_some() {
            matching.seed = self.seed;
        }
    }
}

impl Cli {
    /// Loads the config file (if any) and layers the command line on top.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(encoding) = self.encoding {
            config.files.encoding = encoding;
        }

        match &self.command {
            Command::Split(args) => args.apply(&mut config),
            Command::Encrypt(args) => args.apply(&mut config),
            Command::Match(args) => args.apply(&mut config),
        }

        Ok(config)
    }
}
