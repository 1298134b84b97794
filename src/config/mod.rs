pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::ports::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_non_empty_string, validate_output_formats, validate_path, validate_positive_number,
    Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

/// 資料檔預設的出入站欄位名稱
pub const DEFAULT_ENTRY_COLUMN: &str = "SFZRKMC";
pub const DEFAULT_EXIT_COLUMN: &str = "SFZCKMC";
pub const DEFAULT_TOP_K: usize = 10;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "toll-flow")]
#[command(about = "Analyse toll station entry/exit records and build a flow diagram payload")]
pub struct CliConfig {
    /// 輸入資料檔（含表頭的 CSV）
    #[arg(long, default_value = "data.csv")]
    pub input_path: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// 入口站名稱欄位
    #[arg(long, default_value = DEFAULT_ENTRY_COLUMN)]
    pub entry_column: String,

    /// 出口站名稱欄位
    #[arg(long, default_value = DEFAULT_EXIT_COLUMN)]
    pub exit_column: String,

    /// 保留出現次數最多的前 K 條路徑
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(
        long,
        help = "Fail on records with missing station fields instead of skipping them"
    )]
    pub strict: bool,

    /// 輸出格式，逗號分隔（json 與 csv）
    #[arg(long, value_delimiter = ',', default_value = "json,csv")]
    pub output_formats: Vec<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn entry_column(&self) -> &str {
        &self.entry_column
    }

    fn exit_column(&self) -> &str {
        &self.exit_column
    }

    fn top_k(&self) -> usize {
        self.top_k
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input_path", &self.input_path)?;
        validate_path("output_path", &self.output_path)?;
        validate_non_empty_string("entry_column", &self.entry_column)?;
        validate_non_empty_string("exit_column", &self.exit_column)?;
        validate_positive_number("top_k", self.top_k, 1)?;
        validate_output_formats("output_formats", &self.output_formats)?;
        Ok(())
    }
}
