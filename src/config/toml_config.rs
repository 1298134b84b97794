use crate::config::{DEFAULT_ENTRY_COLUMN, DEFAULT_EXIT_COLUMN, DEFAULT_TOP_K};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_output_formats, validate_path, validate_positive_number,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub columns: Option<ColumnsConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    pub entry: Option<String>,
    pub exit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub top_k: Option<usize>,
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AnalysisError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AnalysisError::InvalidConfigValueError {
            field: "toml".to_string(),
            value: "<config file>".to_string(),
            reason: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_FILE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.source.path
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn entry_column(&self) -> &str {
        self.columns
            .as_ref()
            .and_then(|c| c.entry.as_deref())
            .unwrap_or(DEFAULT_ENTRY_COLUMN)
    }

    fn exit_column(&self) -> &str {
        self.columns
            .as_ref()
            .and_then(|c| c.exit.as_deref())
            .unwrap_or(DEFAULT_EXIT_COLUMN)
    }

    fn top_k(&self) -> usize {
        self.analysis
            .as_ref()
            .and_then(|a| a.top_k)
            .unwrap_or(DEFAULT_TOP_K)
    }

    fn strict(&self) -> bool {
        self.analysis
            .as_ref()
            .and_then(|a| a.strict)
            .unwrap_or(false)
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validate_path("source.path", &self.source.path)?;
        validate_path("load.output_path", &self.load.output_path)?;
        validate_output_formats("load.output_formats", &self.load.output_formats)?;
        validate_positive_number("analysis.top_k", self.top_k(), 1)?;

        if let Some(columns) = &self.columns {
            if let Some(entry) = &columns.entry {
                validate_non_empty_string("columns.entry", entry)?;
            }
            if let Some(exit) = &columns.exit {
                validate_non_empty_string("columns.exit", exit)?;
            }
        }

        Ok(())
    }
}
