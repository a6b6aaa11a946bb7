use crate::adapters::delimited::{DelimitedFormat, Table};
use crate::core::retry::RetryPolicy;
use crate::core::{AccountEncryptor, AccountRecord, EncryptedRecord, Pipeline, RunReport, Storage};
use crate::domain::model::{
    ACCOUNT_COLUMN, CLIENT_CODE_COLUMN, ENCRYPTED_HEADER, NAME_COLUMN, NATIONAL_ID_COLUMN,
};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EncryptSettings {
    pub input: String,
    pub output: String,
    /// Number of requests in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Pause each worker takes before issuing a request.
    pub request_delay: Duration,
    /// Rewrite the output file every this many completed records.
    pub checkpoint_every: usize,
    pub progress_every: usize,
    pub write_summary: bool,
    pub format: DelimitedFormat,
}

impl EncryptSettings {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            concurrency: 5,
            retry: RetryPolicy::default(),
            request_delay: Duration::ZERO,
            checkpoint_every: 100,
            progress_every: 10,
            write_summary: true,
            format: DelimitedFormat::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncryptionRun {
    pub records: Vec<EncryptedRecord>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub fn summary_path(output: &str) -> String {
    format!("{}.summary.json", output)
}

/// Maps rows to records by header name. Short rows yield empty fields.
pub fn parse_accounts(table: &Table, file: &str) -> Result<Vec<AccountRecord>> {
    let account = table.require_column(ACCOUNT_COLUMN, file)?;
    let name = table.require_column(NAME_COLUMN, file)?;
    let national_id = table.require_column(NATIONAL_ID_COLUMN, file)?;
    let client_code = table.require_column(CLIENT_CODE_COLUMN, file)?;

    let field = |row: &[String], idx: usize| row.get(idx).cloned().unwrap_or_default();

    Ok(table
        .rows
        .iter()
        .map(|row| AccountRecord {
            account: field(row, account),
            name: field(row, name),
            national_id: field(row, national_id),
            client_code: field(row, client_code),
        })
        .collect())
}

fn preview(value: &str) -> String {
    value.chars().take(20).collect()
}

pub struct EncryptionPipeline<E: AccountEncryptor, S: Storage> {
    encryptor: E,
    storage: S,
    settings: EncryptSettings,
}

impl<E: AccountEncryptor, S: Storage> EncryptionPipeline<E, S> {
    pub fn new(encryptor: E, storage: S, settings: EncryptSettings) -> Self {
        Self {
            encryptor,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &EncryptSettings {
        &self.settings
    }

    async fn process_record(&self, record: AccountRecord) -> EncryptedRecord {
        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }

        let encryptor = &self.encryptor;
        let account = record.account.as_str();
        let client_code = record.client_code.as_str();
        let label = format!("Encrypting account {}", account);

        let outcome = self
            .settings
            .retry
            .run(&label, move || encryptor.encrypt(account, client_code))
            .await;

        match outcome.result {
            Ok(value) => EncryptedRecord::succeeded(record, value, outcome.attempts),
            Err(e) => EncryptedRecord::failed(record, e.to_string(), outcome.attempts),
        }
    }

    async fn write_results(&self, results: &[EncryptedRecord]) -> Result<()> {
        let data = self
            .settings
            .format
            .write_table(&ENCRYPTED_HEADER, results.iter().map(EncryptedRecord::to_row))?;
        self.storage.write_file(&self.settings.output, &data).await
    }
}

#[async_trait::async_trait]
impl<E: AccountEncryptor, S: Storage> Pipeline for EncryptionPipeline<E, S> {
    type Extracted = Vec<AccountRecord>;
    type Transformed = EncryptionRun;

    fn name(&self) -> &str {
        "encrypt"
    }

    async fn extract(&self) -> Result<Vec<AccountRecord>> {
        tracing::info!("Reading accounts from {}", self.settings.input);
        let data = self.storage.read_file(&self.settings.input).await?;
        let table = self.settings.format.read_table(&data)?;
        let records = parse_accounts(&table, &self.settings.input)?;
        tracing::info!("{} records read", records.len());
        Ok(records)
    }

    async fn transform(&self, records: Vec<AccountRecord>) -> Result<EncryptionRun> {
        let started_at = Utc::now();
        let total = records.len();
        let settings = &self.settings;

        tracing::info!(
            "Encrypting {} accounts with {} workers ({} attempts per account)",
            total,
            settings.concurrency.max(1),
            settings.retry.max_attempts()
        );

        let mut results = Vec::with_capacity(total);
        let pending: Vec<_> = records
            .into_iter()
            .map(|record| self.process_record(record))
            .collect();
        let mut completions = stream::iter(pending).buffer_unordered(settings.concurrency.max(1));

        while let Some(result) = completions.next().await {
            results.push(result);
            let done = results.len();

            if settings.progress_every > 0 && (done % settings.progress_every == 0 || done == total)
            {
                let last = &results[done - 1];
                tracing::info!(
                    "Processed: {}/{} ({:.1}%) - account {} -> {}",
                    done,
                    total,
                    done as f64 / total as f64 * 100.0,
                    last.record.account,
                    last.error
                        .as_deref()
                        .map(|e| format!("ERROR: {}", e))
                        .unwrap_or_else(|| preview(&last.encrypted_account))
                );
            }

            if settings.checkpoint_every > 0 && done % settings.checkpoint_every == 0 && done < total
            {
                match self.write_results(&results).await {
                    Ok(()) => tracing::info!("Checkpoint saved: {} records", done),
                    Err(e) => tracing::warn!("Checkpoint at {} records failed: {}", done, e),
                }
            }
        }

        Ok(EncryptionRun {
            records: results,
            started_at,
        })
    }

    async fn load(&self, run: EncryptionRun) -> Result<RunReport> {
        self.write_results(&run.records).await?;

        let total = run.records.len();
        let failed = run.records.iter().filter(|r| r.is_error()).count();
        let mut outputs = vec![self.settings.output.clone()];

        if self.settings.write_summary {
            let summary = RunSummary {
                input: &self.settings.input,
                output: &self.settings.output,
                started_at: run.started_at,
                finished_at: Utc::now(),
                total,
                succeeded: total - failed,
                failed,
            };
            let path = summary_path(&self.settings.output);
            let json = serde_json::to_vec_pretty(&summary)?;
            self.storage.write_file(&path, &json).await?;
            outputs.push(path);
        }

        tracing::info!("Total processed: {}", total);
        tracing::info!("Succeeded: {}", total - failed);
        if failed > 0 {
            tracing::warn!("Errors: {}", failed);
        } else {
            tracing::info!("Errors: 0");
        }

        Ok(RunReport {
            job: "encrypt".to_string(),
            outputs,
            records: total,
            failed,
        })
    }
}
