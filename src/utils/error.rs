use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Record {row} is missing required field '{field}'")]
    MissingFieldError { row: usize, field: String },

    #[error("Path '{value}' does not contain the ' -> ' delimiter")]
    PathParseError { value: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Data,
    Io,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Config
            }
            Self::CsvError(_) | Self::MissingFieldError { .. } | Self::PathParseError { .. } => {
                ErrorCategory::Data
            }
            Self::IoError(_) => ErrorCategory::Io,
            Self::SerializationError(_) | Self::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::MissingConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorSeverity::Medium
            }
            Self::CsvError(_)
            | Self::IoError(_)
            | Self::MissingFieldError { .. }
            | Self::PathParseError { .. } => ErrorSeverity::High,
            Self::SerializationError(_) | Self::ProcessingError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::CsvError(_) => {
                "Check that the input file is a valid delimited table with a header row".to_string()
            }
            Self::IoError(_) => {
                "Check that the input file exists and the output directory is writable".to_string()
            }
            Self::SerializationError(_) => {
                "Report this as a bug; the payload should always serialize".to_string()
            }
            Self::MissingConfigError { field } => format!("Provide a value for '{}'", field),
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}' and retry", field)
            }
            Self::MissingFieldError { field, .. } => format!(
                "Fix the source data, point --entry-column/--exit-column at the right headers, or drop --strict to skip bad rows ('{}')",
                field
            ),
            Self::PathParseError { .. } => {
                "Path strings must use the ' -> ' delimiter between entry and exit station"
                    .to_string()
            }
            Self::ProcessingError { .. } => "Re-run with --verbose and report the log".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::CsvError(e) => format!("輸入資料格式不正確: {}", e),
            Self::IoError(e) => format!("檔案讀寫失敗: {}", e),
            Self::MissingFieldError { row, field } => {
                format!("第 {} 筆紀錄缺少欄位 '{}'", row, field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
