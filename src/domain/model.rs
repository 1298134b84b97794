use crate::utils::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 路徑字串使用的分隔符（入口站 -> 出口站）
pub const PATH_DELIMITER: &str = " -> ";

/// 一列原始資料：欄位名稱對應欄位值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, String>,
}

/// 一組出入站配對，作為統計的分組鍵。
///
/// The pair stays structured through the whole pipeline; the `"entry -> exit"`
/// string is only a display format, so station names that themselves contain
/// `" -> "` can never corrupt grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationPair {
    pub entry: String,
    pub exit: String,
}

impl StationPair {
    pub fn new(entry: impl Into<String>, exit: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            exit: exit.into(),
        }
    }
}

impl fmt::Display for StationPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.entry, PATH_DELIMITER, self.exit)
    }
}

impl FromStr for StationPair {
    type Err = AnalysisError;

    /// Splits on the first `" -> "`; everything after it is the exit name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(PATH_DELIMITER) {
            Some((entry, exit)) => Ok(Self::new(entry, exit)),
            None => Err(AnalysisError::PathParseError {
                value: s.to_string(),
            }),
        }
    }
}

/// 一條路徑及其出現次數
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCount {
    pub pair: StationPair,
    pub count: u64,
}

/// Sankey 圖的一條連線，source/target 為節點索引
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: u64,
}

/// 流量圖的完整內容：節點標籤加上帶權重的連線
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowPayload {
    pub nodes: Vec<String>,
    pub links: Vec<FlowLink>,
}

/// transform 階段的完整輸出
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub top_paths: Vec<PathCount>,
    pub payload: FlowPayload,
    pub csv_output: String,
    pub total_records: usize,
    pub skipped_records: usize,
}
