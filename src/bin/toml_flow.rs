use clap::Parser;
use toll_flow::config::toml_config::TomlConfig;
use toll_flow::domain::ports::ConfigProvider;
use toll_flow::utils::{logger, validation::Validate};
use toll_flow::{AnalysisEngine, FlowPipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-flow")]
#[command(about = "Toll path analysis driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "flow-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override strict-mode setting from config
    #[arg(long)]
    strict: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based path analysis");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(strict) = args.strict {
        config
            .analysis
            .get_or_insert_with(Default::default)
            .strict = Some(strict);
        tracing::info!("🔧 Strict mode overridden to: {}", strict);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = FlowPipeline::new(storage, config);
    let engine = AnalysisEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Path analysis completed successfully!");
            println!("✅ Path analysis completed successfully!");
            println!("📁 Flow diagram payload saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!("❌ Path analysis failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("📋 Pipeline: {} v{}", config.pipeline.name, config.pipeline.version);
    tracing::info!("📥 Input: {}", config.input_path());
    tracing::info!(
        "🛣️ Columns: {} -> {}",
        config.entry_column(),
        config.exit_column()
    );
    tracing::info!(
        "🔝 Top-K: {} (strict: {})",
        config.top_k(),
        config.strict()
    );
    tracing::info!(
        "📤 Output: {} ({})",
        config.output_path(),
        config.output_formats().join(", ")
    );
}
