use account_etl::adapters::delimited::DelimitedFormat;
use account_etl::adapters::http::HttpEncryptorSettings;
use account_etl::core::encrypt::EncryptSettings;
use account_etl::core::matcher::MatchSettings;
use account_etl::core::retry::RetryPolicy;
use account_etl::core::shard::ShardSettings;
use account_etl::domain::model::ACCOUNT_HEADER;
use account_etl::{
    AppConfig, EncryptionPipeline, EtlEngine, HttpEncryptor, LocalStorage, MatchPipeline,
    ShardPipeline,
};
use anyhow::Result;
use httpmock::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

fn read_table(dir: &TempDir, name: &str) -> Result<account_etl::adapters::delimited::Table> {
    let data = std::fs::read(dir.path().join(name))?;
    Ok(DelimitedFormat::default().read_table(&data)?)
}

#[tokio::test]
async fn test_split_writes_header_into_every_shard() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let rows: Vec<Vec<String>> = (1..=11)
        .map(|i| vec![format!("{}", i), "N".into(), "D".into(), "01".into()])
        .collect();
    let data = DelimitedFormat::default().write_table(&ACCOUNT_HEADER, rows)?;
    std::fs::write(temp_dir.path().join("found.txt"), data)?;

    let settings = ShardSettings {
        input: "found.txt".to_string(),
        parts: 3,
        output_dir: None,
        format: DelimitedFormat::default(),
    };
    let engine = EtlEngine::new(ShardPipeline::new(LocalStorage::new(temp_dir.path()), settings));
    let report = engine.run().await?;

    assert_eq!(
        report.outputs,
        vec!["found_part1.txt", "found_part2.txt", "found_part3.txt"]
    );
    assert_eq!(report.records, 11);

    let sizes: Vec<usize> = report
        .outputs
        .iter()
        .map(|name| read_table(&temp_dir, name).map(|t| t.len()))
        .collect::<Result<_>>()?;
    assert_eq!(sizes, vec![3, 3, 5]);

    let last = read_table(&temp_dir, "found_part3.txt")?;
    assert_eq!(last.header, ACCOUNT_HEADER);
    assert_eq!(last.rows[0][0], "7");
    assert_eq!(last.rows[4][0], "11");

    let raw = std::fs::read_to_string(temp_dir.path().join("found_part1.txt"))?;
    assert!(raw.starts_with("\"cuenta\";\"nombre\";\"dni\";\"cod\"\n\"1\";"));
    Ok(())
}

/// match → split → encrypt, driven from a TOML config like the CLI does.
#[tokio::test]
async fn test_full_workflow_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let base = temp_dir.path();

    std::fs::write(
        base.join("con_dni.txt"),
        b"\"cuenta\";\"x\";\"cod\";\"nombre\";\"dni\"\n\
          \"000111\";\"\";\"07\";\"P\xc9REZ JUAN\";\"0020111222\"\n\
          \"222\";\"\";\"09\";\"GOMEZ MARIA\";\"27999888\"\n",
    )?;
    std::fs::write(
        base.join("sin_dni.txt"),
        b"\"cuenta\";\"nombre\"\n\"111\";\"JUAN PEREZ\"\n\"0222\";\"RUIZ PEDRO\"\n\"333\";\"NADIE\"\n",
    )?;

    let server = MockServer::start();
    let api = server.mock(|when, then| {
        when.method(POST).path("/enc");
        then.status(200).json_body(serde_json::json!({
            "DFHCOMMAREA": { "WS_ENC_FIELDS": { "WS_ENC_ACCT": "c2VjcmV0" } }
        }));
    });

    let toml_content = format!(
        r#"
[api]
endpoint = "{}"

[match]
reference = "con_dni.txt"
targets = "sin_dni.txt"
seed = 3

[split]
input = "matched_all.txt"
parts = 2

[encrypt]
input = "matched_all_part1.txt"
output = "encrypted_part1.txt"
retry_delay_ms = 1
"#,
        server.url("/enc")
    );
    let config = AppConfig::from_toml_str(&toml_content)?;
    let storage = LocalStorage::new(base);

    let matched = EtlEngine::new(MatchPipeline::new(storage.clone(), config.match_settings()?))
        .run()
        .await?;
    assert_eq!(matched.records, 3);
    assert_eq!(matched.failed, 1);

    let all = read_table(&temp_dir, "matched_all.txt")?;
    assert_eq!(all.len(), 2);
    assert_eq!(all.rows[0], vec!["111", "JUAN PEREZ", "0020111222", "07"]);

    let above = read_table(&temp_dir, "matched_above_threshold.txt")?;
    assert_eq!(above.len(), 1);
    assert_eq!(above.rows[0][4], "100.00%");

    let ids = std::fs::read_to_string(base.join("national_ids.txt"))?;
    assert_eq!(ids, "20111222\n27999888\n");

    let unmatched = read_table(&temp_dir, "unmatched_with_password.txt")?;
    assert_eq!(unmatched.rows[0][0], "333");
    assert_eq!(unmatched.rows[0][2].len(), 9);

    let split = EtlEngine::new(ShardPipeline::new(storage.clone(), config.shard_settings()?))
        .run()
        .await?;
    assert_eq!(split.outputs.len(), 2);

    let encryptor = HttpEncryptor::new(&config.http_settings()?)?;
    let encrypted = EtlEngine::new(EncryptionPipeline::new(
        encryptor,
        storage,
        config.encrypt_settings()?,
    ))
    .run()
    .await?;

    api.assert_hits(1);
    assert_eq!(encrypted.records, 1);
    assert_eq!(encrypted.failed, 0);
    let out = read_table(&temp_dir, "encrypted_part1.txt")?;
    assert_eq!(out.rows[0][0], "111");
    assert_eq!(out.rows[0][1], "c2VjcmV0");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_endpoint_marks_every_record() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let rows = vec![
        vec!["1", "A", "10", "01"],
        vec!["2", "B", "20", "01"],
    ];
    let data = DelimitedFormat::default().write_table(&ACCOUNT_HEADER, rows)?;
    std::fs::write(temp_dir.path().join("in.txt"), data)?;

    // Port 9 (discard) is not listening; every connect fails fast.
    let mut http = HttpEncryptorSettings::new("http://127.0.0.1:9/enc");
    http.timeout = Duration::from_secs(2);
    let mut settings = EncryptSettings::new("in.txt", "out.txt");
    settings.retry = RetryPolicy::new(2, Duration::from_millis(1));
    settings.write_summary = false;

    let report = EtlEngine::new(EncryptionPipeline::new(
        HttpEncryptor::new(&http)?,
        LocalStorage::new(temp_dir.path()),
        settings,
    ))
    .run()
    .await?;

    assert_eq!(report.records, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.outputs, vec!["out.txt"]);

    let out = read_table(&temp_dir, "out.txt")?;
    for row in &out.rows {
        assert_eq!(row[1], "");
        assert!(!row[5].is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_match_with_custom_threshold() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("ref.txt"),
        b"h\n\"5\";\"\";\"01\";\"ANA LOPEZ\";\"1\"\n",
    )?;
    std::fs::write(temp_dir.path().join("tgt.txt"), b"h\n\"5\";\"ANA LOPES\"\n")?;

    let mut settings = MatchSettings::new("ref.txt", "tgt.txt");
    settings.threshold = 0.95;
    settings.seed = Some(1);
    EtlEngine::new(MatchPipeline::new(LocalStorage::new(temp_dir.path()), settings))
        .run()
        .await?;

    assert_eq!(read_table(&temp_dir, "matched_all.txt")?.len(), 1);
    assert!(read_table(&temp_dir, "matched_above_threshold.txt")?.is_empty());
    Ok(())
}
