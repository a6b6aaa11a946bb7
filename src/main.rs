use account_etl::domain::model::RunReport;
use account_etl::utils::logger;
use account_etl::{
    AppConfig, Cli, Command, EncryptionPipeline, EtlEngine, EtlError, HttpEncryptor, LocalStorage,
    MatchPipeline, ShardPipeline,
};
use clap::Parser;

async fn run(cli: &Cli, config: &AppConfig) -> account_etl::Result<RunReport> {
    let storage = LocalStorage::default();

    match &cli.command {
        Command::Split(_) => {
            let pipeline = ShardPipeline::new(storage, config.shard_settings()?);
            EtlEngine::new(pipeline).run().await
        }
        Command::Encrypt(_) => {
            let settings = config.encrypt_settings()?;
            let encryptor = HttpEncryptor::new(&config.http_settings()?)?;
            tracing::info!("Encryption endpoint: {}", encryptor.endpoint());
            let pipeline = EncryptionPipeline::new(encryptor, storage, settings);
            EtlEngine::new(pipeline).run().await
        }
        Command::Match(_) => {
            let pipeline = MatchPipeline::new(storage, config.match_settings()?);
            EtlEngine::new(pipeline).run().await
        }
    }
}

fn fail(e: &EtlError) -> ! {
    tracing::error!("❌ {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting account-etl");

    // 載入配置並套用命令列覆蓋
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    tracing::debug!("Effective config: {:?}", config);

    match run(&cli, &config).await {
        Ok(report) => {
            println!(
                "✅ {} completed: {} records, {} succeeded, {} failed",
                report.job,
                report.records,
                report.succeeded(),
                report.failed
            );
            for output in &report.outputs {
                println!("📁 {}", output);
            }
        }
        Err(e) => fail(&e),
    }
}
