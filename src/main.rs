use clap::Parser;
use toll_flow::utils::{logger, validation::Validate};
use toll_flow::{AnalysisEngine, CliConfig, FlowPipeline, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting toll-flow path analysis");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 創建存儲和管道
    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = FlowPipeline::new(storage, config);

    // 創建分析引擎並運行
    let engine = AnalysisEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Path analysis completed successfully!");
            tracing::info!("📁 Flow diagram payload saved to: {}", output_path);
            println!("✅ Path analysis completed successfully!");
            println!("📁 Flow diagram payload saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Path analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                toll_flow::utils::error::ErrorSeverity::Low => 0,
                toll_flow::utils::error::ErrorSeverity::Medium => 2,
                toll_flow::utils::error::ErrorSeverity::High => 1,
                toll_flow::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
