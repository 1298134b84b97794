use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct AnalysisEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> AnalysisEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting path analysis...");

        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", raw_data.len());
        self.monitor.log_stats("Extract");

        // Transform
        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Kept top {} paths across {} stations ({} records skipped)",
            result.top_paths.len(),
            result.payload.nodes.len(),
            result.skipped_records
        );
        self.monitor.log_stats("Transform");

        // Load
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
