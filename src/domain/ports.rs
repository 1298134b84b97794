use crate::domain::model::{AnalysisResult, Record};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn entry_column(&self) -> &str;
    fn exit_column(&self) -> &str;
    fn top_k(&self) -> usize;
    fn strict(&self) -> bool;
    fn output_formats(&self) -> &[String];
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<AnalysisResult>;
    async fn load(&self, result: AnalysisResult) -> Result<String>;
}
