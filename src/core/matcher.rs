use crate::adapters::delimited::DelimitedFormat;
use crate::core::similarity::{
    format_similarity, generate_password, name_similarity, normalize_account, rounded_percentage,
};
use crate::core::{AccountRecord, Pipeline, RunReport, Storage};
use crate::domain::model::{
    ACCOUNT_COLUMN, ACCOUNT_HEADER, CLIENT_CODE_COLUMN, NAME_COLUMN, NATIONAL_ID_COLUMN,
};
use crate::utils::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// Positional layout of the two source files.
const REF_ACCOUNT: usize = 0;
const REF_CLIENT_CODE: usize = 2;
const REF_FULL_NAME: usize = 3;
const REF_NATIONAL_ID: usize = 4;
const REF_MIN_FIELDS: usize = 5;
const TARGET_ACCOUNT: usize = 0;
const TARGET_NAME: usize = 1;
const TARGET_MIN_FIELDS: usize = 2;

const SIMILARITY_COLUMN: &str = "similitud";
const PASSWORD_COLUMN: &str = "password";

#[derive(Debug, Clone)]
pub struct MatchOutputs {
    pub all_matches: String,
    pub above_threshold: String,
    pub national_ids: String,
    pub unmatched: String,
}

impl Default for MatchOutputs {
    fn default() -> Self {
        Self {
            all_matches: "matched_all.txt".to_string(),
            above_threshold: "matched_above_threshold.txt".to_string(),
            national_ids: "national_ids.txt".to_string(),
            unmatched: "unmatched_with_password.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// File that carries national IDs, keyed by account.
    pub reference: String,
    /// File of accounts whose national ID must be looked up.
    pub targets: String,
    pub output_dir: String,
    /// Minimum name similarity (0..=1) for the above-threshold file.
    pub threshold: f64,
    pub password_length: usize,
    /// Fixed seed for generated passwords; random when unset.
    pub seed: Option<u64>,
    pub outputs: MatchOutputs,
    pub format: DelimitedFormat,
}

impl MatchSettings {
    pub fn new(reference: impl Into<String>, targets: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            targets: targets.into(),
            output_dir: ".".to_string(),
            threshold: 0.51,
            password_length: 9,
            seed: None,
            outputs: MatchOutputs::default(),
            format: DelimitedFormat::default(),
        }
    }

    fn output_path(&self, file_name: &str) -> String {
        Path::new(&self.output_dir)
            .join(file_name)
            .to_string_lossy()
            .into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub client_code: String,
    pub full_name: String,
    pub national_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub account: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    /// Keyed by account without leading zeros.
    pub reference: HashMap<String, ReferenceEntry>,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Found {
        record: AccountRecord,
        similarity: f64,
    },
    NotFound {
        account: String,
        name: String,
        password: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    pub per_client_code: BTreeMap<String, usize>,
}

impl MatchOutcome {
    pub fn found(&self) -> impl Iterator<Item = (&AccountRecord, f64)> {
        self.results.iter().filter_map(|r| match r {
            MatchResult::Found { record, similarity } => Some((record, *similarity)),
            MatchResult::NotFound { .. } => None,
        })
    }

    pub fn not_found_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, MatchResult::NotFound { .. }))
            .count()
    }
}

pub fn index_reference(rows: &[Vec<String>]) -> HashMap<String, ReferenceEntry> {
    let mut index = HashMap::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() < REF_MIN_FIELDS {
            continue;
        }
        index.insert(
            normalize_account(&row[REF_ACCOUNT]).to_string(),
            ReferenceEntry {
                client_code: row[REF_CLIENT_CODE].clone(),
                full_name: row[REF_FULL_NAME].clone(),
                national_id: row[REF_NATIONAL_ID].clone(),
            },
        );
        if (i + 1) % 100_000 == 0 {
            tracing::debug!("Indexed {} reference rows", i + 1);
        }
    }
    index
}

pub fn parse_targets(rows: &[Vec<String>]) -> Vec<Target> {
    rows.iter()
        .filter(|row| row.len() >= TARGET_MIN_FIELDS)
        .map(|row| Target {
            account: row[TARGET_ACCOUNT].clone(),
            name: row[TARGET_NAME].clone(),
        })
        .collect()
}

/// Looks every target up by normalized account. Hits are scored by name
/// similarity; misses get a generated password.
pub fn match_accounts<R: Rng>(
    input: &MatchInput,
    rng: &mut R,
    password_length: usize,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    let mut found = 0;

    for (i, target) in input.targets.iter().enumerate() {
        match input.reference.get(normalize_account(&target.account)) {
            Some(entry) => {
                let similarity = name_similarity(&target.name, &entry.full_name);
                *outcome
                    .per_client_code
                    .entry(entry.client_code.clone())
                    .or_insert(0) += 1;
                outcome.results.push(MatchResult::Found {
                    record: AccountRecord {
                        account: target.account.clone(),
                        name: target.name.clone(),
                        national_id: entry.national_id.clone(),
                        client_code: entry.client_code.clone(),
                    },
                    similarity,
                });
                found += 1;
            }
            None => outcome.results.push(MatchResult::NotFound {
                account: target.account.clone(),
                name: target.name.clone(),
                password: generate_password(&mut *rng, password_length),
            }),
        }

        if (i + 1) % 10_000 == 0 {
            tracing::info!(
                "Processed {} records (matched: {}, not found: {})",
                i + 1,
                found,
                i + 1 - found
            );
        }
    }

    outcome
}

pub struct MatchPipeline<S: Storage> {
    storage: S,
    settings: MatchSettings,
}

impl<S: Storage> MatchPipeline<S> {
    pub fn new(storage: S, settings: MatchSettings) -> Self {
        Self { storage, settings }
    }

    async fn write(&self, file_name: &str, data: &[u8]) -> Result<String> {
        let path = self.settings.output_path(file_name);
        self.storage.write_file(&path, data).await?;
        tracing::info!("Saved {}", path);
        Ok(path)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for MatchPipeline<S> {
    type Extracted = MatchInput;
    type Transformed = MatchOutcome;

    fn name(&self) -> &str {
        "match"
    }

    async fn extract(&self) -> Result<MatchInput> {
        let format = &self.settings.format;

        tracing::info!("Loading reference file {}", self.settings.reference);
        let data = self.storage.read_file(&self.settings.reference).await?;
        let reference = index_reference(&format.read_table(&data)?.rows);
        tracing::info!("Loaded {} accounts with national ID", reference.len());

        tracing::info!("Loading target file {}", self.settings.targets);
        let data = self.storage.read_file(&self.settings.targets).await?;
        let targets = parse_targets(&format.read_table(&data)?.rows);
        tracing::info!("Loaded {} accounts to match", targets.len());

        Ok(MatchInput { reference, targets })
    }

    async fn transform(&self, input: MatchInput) -> Result<MatchOutcome> {
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let outcome = match_accounts(&input, &mut rng, self.settings.password_length);

        for (client_code, count) in &outcome.per_client_code {
            tracing::info!("Client code {}: {} accounts", client_code, count);
        }
        Ok(outcome)
    }

    async fn load(&self, outcome: MatchOutcome) -> Result<RunReport> {
        let format = &self.settings.format;
        let outputs_cfg = &self.settings.outputs;
        let threshold = rounded_percentage(self.settings.threshold);
        let mut outputs = Vec::new();

        let all = format.write_table(&ACCOUNT_HEADER, outcome.found().map(|(r, _)| r.to_row()))?;
        outputs.push(self.write(&outputs_cfg.all_matches, &all).await?);

        let above = format.write_table(
            &[
                ACCOUNT_COLUMN,
                NAME_COLUMN,
                NATIONAL_ID_COLUMN,
                CLIENT_CODE_COLUMN,
                SIMILARITY_COLUMN,
            ],
            outcome
                .found()
                .filter(|(_, sim)| rounded_percentage(*sim) >= threshold)
                .map(|(r, sim)| {
                    let mut row = r.to_row();
                    row.push(format_similarity(sim));
                    row
                }),
        )?;
        outputs.push(self.write(&outputs_cfg.above_threshold, &above).await?);

        let mut ids = String::new();
        for (record, _) in outcome.found() {
            ids.push_str(normalize_account(&record.national_id));
            ids.push('\n');
        }
        let ids = format.encoding.encode(&ids);
        outputs.push(self.write(&outputs_cfg.national_ids, &ids).await?);

        let unmatched = format.write_table(
            &[ACCOUNT_COLUMN, NAME_COLUMN, PASSWORD_COLUMN],
            outcome.results.iter().filter_map(|r| match r {
                MatchResult::NotFound {
                    account,
                    name,
                    password,
                } => Some([account, name, password]),
                MatchResult::Found { .. } => None,
            }),
        )?;
        outputs.push(self.write(&outputs_cfg.unmatched, &unmatched).await?);

        let not_found = outcome.not_found_count();
        tracing::info!("Total processed: {}", outcome.results.len());
        tracing::info!("Matched: {}", outcome.results.len() - not_found);
        tracing::info!("Not found (password generated): {}", not_found);

        Ok(RunReport {
            job: "match".to_string(),
            outputs,
            records: outcome.results.len(),
            failed: not_found,
        })
    }
}
