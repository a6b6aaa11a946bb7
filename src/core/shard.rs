use crate::adapters::delimited::{DelimitedFormat, Table};
use crate::core::{Pipeline, RunReport, Storage};
use crate::utils::error::{EtlError, Result};
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ShardSettings {
    pub input: String,
    pub parts: usize,
    pub output_dir: Option<String>,
    pub format: DelimitedFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub path: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ShardSet {
    pub header: Vec<String>,
    pub shards: Vec<Shard>,
}

/// Splits `total` rows into `parts` contiguous ranges of `total / parts`
/// rows each; the last range also takes the remainder.
pub fn plan_shards(total: usize, parts: usize) -> Result<Vec<Range<usize>>> {
    if parts == 0 {
        return Err(EtlError::InvalidConfigValueError {
            field: "split.parts".to_string(),
            value: parts.to_string(),
            reason: "Value must be at least 1".to_string(),
        });
    }

    let per_part = total / parts;
    Ok((0..parts)
        .map(|i| {
            let start = i * per_part;
            let end = if i == parts - 1 { total } else { start + per_part };
            start..end
        })
        .collect())
}

/// `data/accounts.txt`, 2 → `data/accounts_part2.txt` (or under `output_dir`).
pub fn shard_file_name(input: &str, index: usize, output_dir: Option<&str>) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shard".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}_part{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_part{}", stem, index),
    };

    let dir = match output_dir {
        Some(dir) => Path::new(dir),
        None => path.parent().unwrap_or_else(|| Path::new("")),
    };
    dir.join(file_name).to_string_lossy().into_owned()
}

pub struct ShardPipeline<S: Storage> {
    storage: S,
    settings: ShardSettings,
}

impl<S: Storage> ShardPipeline<S> {
    pub fn new(storage: S, settings: ShardSettings) -> Self {
        Self { storage, settings }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ShardPipeline<S> {
    type Extracted = Table;
    type Transformed = ShardSet;

    fn name(&self) -> &str {
        "split"
    }

    async fn extract(&self) -> Result<Table> {
        tracing::info!(
            "Splitting {} into {} parts",
            self.settings.input,
            self.settings.parts
        );
        let data = self.storage.read_file(&self.settings.input).await?;
        let table = self.settings.format.read_table(&data)?;
        tracing::info!("Total records: {}", table.len());
        Ok(table)
    }

    async fn transform(&self, table: Table) -> Result<ShardSet> {
        let ranges = plan_shards(table.len(), self.settings.parts)?;
        tracing::info!("Records per shard: ~{}", table.len() / self.settings.parts);

        let mut rows = table.rows.into_iter();
        let shards = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| Shard {
                path: shard_file_name(
                    &self.settings.input,
                    i + 1,
                    self.settings.output_dir.as_deref(),
                ),
                rows: rows.by_ref().take(range.len()).collect(),
            })
            .collect();

        Ok(ShardSet {
            header: table.header,
            shards,
        })
    }

    async fn load(&self, set: ShardSet) -> Result<RunReport> {
        let mut outputs = Vec::with_capacity(set.shards.len());
        let mut records = 0;

        for shard in &set.shards {
            let data = self
                .settings
                .format
                .write_table(set.header.as_slice(), &shard.rows)?;
            self.storage.write_file(&shard.path, &data).await?;
            tracing::info!("Created: {} ({} records)", shard.path, shard.rows.len());

            records += shard.rows.len();
            outputs.push(shard.path.clone());
        }

        tracing::info!("Run one shard per terminal:");
        for (i, path) in outputs.iter().enumerate() {
            tracing::info!("  Terminal {}: account-etl encrypt --input {}", i + 1, path);
        }

        Ok(RunReport {
            job: "split".to_string(),
            outputs,
            records,
            failed: 0,
        })
    }
}
