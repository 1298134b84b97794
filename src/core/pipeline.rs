use crate::core::{
    AnalysisResult, ConfigProvider, FlowLink, FlowPayload, PathCount, Pipeline, Record,
    StationPair, Storage,
};
use crate::utils::error::{AnalysisError, Result};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

pub const FLOW_FILENAME: &str = "flow.json";
pub const TOP_PATHS_FILENAME: &str = "top_paths.csv";
pub const SUMMARY_FILENAME: &str = "summary.json";

pub struct FlowPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> FlowPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

/// 取出欄位值，空白或缺少視為無效
fn field_value(record: &Record, column: &str) -> Option<String> {
    record
        .data
        .get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 由前 K 條路徑建立流量圖：節點依字典序編號，連線沿用路徑順序。
///
/// Sorting the node labels makes index assignment deterministic across runs,
/// so two runs over the same input produce identical payloads.
pub fn build_flow_payload(top_paths: &[PathCount]) -> FlowPayload {
    let mut names: HashSet<&str> = HashSet::new();
    for path in top_paths {
        names.insert(&path.pair.entry);
        names.insert(&path.pair.exit);
    }

    let mut nodes: Vec<String> = names.into_iter().map(str::to_string).collect();
    nodes.sort();

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let links = top_paths
        .iter()
        .map(|path| FlowLink {
            source: index[path.pair.entry.as_str()],
            target: index[path.pair.exit.as_str()],
            value: path.count,
        })
        .collect();

    FlowPayload { nodes, links }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for FlowPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::debug!("Reading input table from: {}", self.config.input_path());
        let bytes = self.storage.read_file(self.config.input_path()).await?;

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut data = HashMap::new();
            for (header, value) in headers.iter().zip(row.iter()) {
                data.insert(header.to_string(), value.to_string());
            }
            records.push(Record { data });
        }

        tracing::debug!("Parsed {} records", records.len());
        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<AnalysisResult> {
        let entry_column = self.config.entry_column();
        let exit_column = self.config.exit_column();
        let total_records = data.len();

        // 統計每組出入站配對的出現次數，並記錄首次出現的順序
        let mut counts: HashMap<StationPair, u64> = HashMap::new();
        let mut first_seen: Vec<StationPair> = Vec::new();
        let mut skipped_records = 0usize;

        for (row, record) in data.iter().enumerate() {
            let entry = field_value(record, entry_column);
            let exit = field_value(record, exit_column);

            let (entry, exit) = match (entry, exit) {
                (Some(entry), Some(exit)) => (entry, exit),
                (entry, _) => {
                    let field = if entry.is_none() {
                        entry_column
                    } else {
                        exit_column
                    };
                    if self.config.strict() {
                        return Err(AnalysisError::MissingFieldError {
                            row: row + 1,
                            field: field.to_string(),
                        });
                    }
                    skipped_records += 1;
                    continue;
                }
            };

            match counts.entry(StationPair::new(entry, exit)) {
                Entry::Occupied(mut occupied) => *occupied.get_mut() += 1,
                Entry::Vacant(vacant) => {
                    first_seen.push(vacant.key().clone());
                    vacant.insert(1);
                }
            }
        }

        if skipped_records > 0 {
            tracing::warn!(
                "Skipped {} records with missing station fields",
                skipped_records
            );
        }

        // 依次數排序；sort_by 是穩定排序，同次數者保留首次出現的順序
        let mut top_paths: Vec<PathCount> = first_seen
            .into_iter()
            .map(|pair| {
                let count = counts[&pair];
                PathCount { pair, count }
            })
            .collect();
        top_paths.sort_by(|a, b| b.count.cmp(&a.count));
        top_paths.truncate(self.config.top_k());

        tracing::debug!(
            "Aggregated {} distinct paths, keeping top {}",
            counts.len(),
            top_paths.len()
        );

        let payload = build_flow_payload(&top_paths);

        // 路徑清單輸出成 CSV
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["path", "count"])?;
        for path in &top_paths {
            writer.write_record([path.pair.to_string(), path.count.to_string()])?;
        }
        let csv_bytes = writer
            .into_inner()
            .map_err(|e| AnalysisError::ProcessingError {
                message: format!("CSV buffer error: {}", e),
            })?;
        let csv_output =
            String::from_utf8(csv_bytes).map_err(|e| AnalysisError::ProcessingError {
                message: format!("CSV output is not valid UTF-8: {}", e),
            })?;

        Ok(AnalysisResult {
            top_paths,
            payload,
            csv_output,
            total_records,
            skipped_records,
        })
    }

    async fn load(&self, result: AnalysisResult) -> Result<String> {
        tracing::debug!(
            "Writing payload with {} nodes and {} links",
            result.payload.nodes.len(),
            result.payload.links.len()
        );

        let formats = self.config.output_formats();
        let json_enabled = formats.iter().any(|f| f == "json");

        if json_enabled {
            let payload_json = serde_json::to_string_pretty(&result.payload)?;
            self.storage
                .write_file(FLOW_FILENAME, payload_json.as_bytes())
                .await?;

            let summary = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "total_records": result.total_records,
                "skipped_records": result.skipped_records,
                "path_count": result.top_paths.len(),
                "node_count": result.payload.nodes.len(),
            });
            self.storage
                .write_file(
                    SUMMARY_FILENAME,
                    serde_json::to_string_pretty(&summary)?.as_bytes(),
                )
                .await?;
        }

        if formats.iter().any(|f| f == "csv") {
            self.storage
                .write_file(TOP_PATHS_FILENAME, result.csv_output.as_bytes())
                .await?;
        }

        let primary = if json_enabled {
            FLOW_FILENAME
        } else {
            TOP_PATHS_FILENAME
        };
        let output_path = format!("{}/{}", self.config.output_path(), primary);
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put_file(&self, path: &str, data: &[u8]) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                AnalysisError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_path: String,
        entry_column: String,
        exit_column: String,
        top_k: usize,
        strict: bool,
        output_formats: Vec<String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                input_path: "data.csv".to_string(),
                output_path: "test_output".to_string(),
                entry_column: "SFZRKMC".to_string(),
                exit_column: "SFZCKMC".to_string(),
                top_k: 10,
                strict: false,
                output_formats: vec!["json".to_string(), "csv".to_string()],
            }
        }

        fn with_top_k(mut self, top_k: usize) -> Self {
            self.top_k = top_k;
            self
        }

        fn with_strict(mut self) -> Self {
            self.strict = true;
            self
        }

        fn with_formats(mut self, formats: &[&str]) -> Self {
            self.output_formats = formats.iter().map(|f| f.to_string()).collect();
            self
        }
    }

    impl ConfigProvider for MockConfig {
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

    fn record(entry: &str, exit: &str) -> Record {
        let mut data = HashMap::new();
        data.insert("SFZRKMC".to_string(), entry.to_string());
        data.insert("SFZCKMC".to_string(), exit.to_string());
        Record { data }
    }

    async fn pipeline_with_csv(csv: &str) -> FlowPipeline<MockStorage, MockConfig> {
        let storage = MockStorage::new();
        storage.put_file("data.csv", csv.as_bytes()).await;
        FlowPipeline::new(storage, MockConfig::new())
    }

    #[tokio::test]
    async fn test_extract_parses_csv_with_headers() {
        let csv = "SFZRKMC,SFZCKMC,JE\n北站,南站,12.5\n東站,西站,30.0\n";
        let pipeline = pipeline_with_csv(csv).await;

        let records = pipeline.extract().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data.get("SFZRKMC").unwrap(), "北站");
        assert_eq!(records[0].data.get("SFZCKMC").unwrap(), "南站");
        assert_eq!(records[1].data.get("JE").unwrap(), "30.0");
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_error() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(AnalysisError::IoError(_))));
    }

    #[tokio::test]
    async fn test_extract_malformed_csv_is_error() {
        // 欄位數與表頭不一致
        let csv = "SFZRKMC,SFZCKMC\n北站,南站\n東站\n";
        let pipeline = pipeline_with_csv(csv).await;

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(AnalysisError::CsvError(_))));
    }

    #[tokio::test]
    async fn test_extract_header_only_file_yields_no_records() {
        let pipeline = pipeline_with_csv("SFZRKMC,SFZCKMC\n").await;

        let records = pipeline.extract().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_transform_counts_and_orders_by_frequency() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        let data = vec![
            record("A", "B"),
            record("A", "B"),
            record("B", "C"),
            record("A", "B"),
        ];

        let result = pipeline.transform(data).await.unwrap();

        assert_eq!(result.top_paths.len(), 2);
        assert_eq!(result.top_paths[0].pair, StationPair::new("A", "B"));
        assert_eq!(result.top_paths[0].count, 3);
        assert_eq!(result.top_paths[1].pair, StationPair::new("B", "C"));
        assert_eq!(result.top_paths[1].count, 1);

        assert_eq!(result.payload.nodes, vec!["A", "B", "C"]);
        assert_eq!(
            result.payload.links,
            vec![
                FlowLink {
                    source: 0,
                    target: 1,
                    value: 3
                },
                FlowLink {
                    source: 1,
                    target: 2,
                    value: 1
                },
            ]
        );
        assert_eq!(result.total_records, 4);
        assert_eq!(result.skipped_records, 0);
    }

    #[tokio::test]
    async fn test_transform_tie_break_keeps_first_seen_order() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        // 11 條不同路徑，各出現一次：前 10 條依出現順序保留
        let data: Vec<Record> = (1..=11)
            .map(|i| record(&format!("P{:02}", i), &format!("Q{:02}", i)))
            .collect();

        let result = pipeline.transform(data).await.unwrap();

        assert_eq!(result.top_paths.len(), 10);
        for (i, path) in result.top_paths.iter().enumerate() {
            assert_eq!(path.pair.entry, format!("P{:02}", i + 1));
            assert_eq!(path.count, 1);
        }
    }

    #[tokio::test]
    async fn test_transform_lower_count_cannot_displace_earlier_tie() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new().with_top_k(2));

        let data = vec![
            record("A", "B"),
            record("C", "D"),
            record("E", "F"),
            record("E", "F"),
        ];

        let result = pipeline.transform(data).await.unwrap();

        // E->F 次數最高排第一，A->B 與 C->D 同為 1 次，先出現的 A->B 留下
        assert_eq!(result.top_paths.len(), 2);
        assert_eq!(result.top_paths[0].pair, StationPair::new("E", "F"));
        assert_eq!(result.top_paths[1].pair, StationPair::new("A", "B"));
    }

    #[tokio::test]
    async fn test_transform_empty_input() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        let result = pipeline.transform(Vec::new()).await.unwrap();

        assert!(result.top_paths.is_empty());
        assert!(result.payload.nodes.is_empty());
        assert!(result.payload.links.is_empty());
        assert_eq!(result.total_records, 0);
    }

    #[tokio::test]
    async fn test_transform_skips_records_with_missing_fields() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        let mut missing_exit = HashMap::new();
        missing_exit.insert("SFZRKMC".to_string(), "A".to_string());
        missing_exit.insert("SFZCKMC".to_string(), "  ".to_string());

        let mut missing_entry = HashMap::new();
        missing_entry.insert("SFZCKMC".to_string(), "B".to_string());

        let data = vec![
            record("A", "B"),
            Record { data: missing_exit },
            Record {
                data: missing_entry,
            },
        ];

        let result = pipeline.transform(data).await.unwrap();

        assert_eq!(result.top_paths.len(), 1);
        assert_eq!(result.top_paths[0].count, 1);
        assert_eq!(result.skipped_records, 2);
        assert_eq!(result.total_records, 3);
    }

    #[tokio::test]
    async fn test_transform_strict_mode_fails_on_missing_field() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new().with_strict());

        let mut missing_exit = HashMap::new();
        missing_exit.insert("SFZRKMC".to_string(), "A".to_string());

        let data = vec![record("A", "B"), Record { data: missing_exit }];

        let result = pipeline.transform(data).await;

        match result {
            Err(AnalysisError::MissingFieldError { row, field }) => {
                assert_eq!(row, 2);
                assert_eq!(field, "SFZCKMC");
            }
            other => panic!("expected MissingFieldError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transform_truncates_to_top_k() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new().with_top_k(2));

        let data = vec![
            record("A", "B"),
            record("A", "B"),
            record("A", "B"),
            record("B", "C"),
            record("B", "C"),
            record("C", "D"),
        ];

        let result = pipeline.transform(data).await.unwrap();

        assert_eq!(result.top_paths.len(), 2);
        assert_eq!(result.top_paths[0].count, 3);
        assert_eq!(result.top_paths[1].count, 2);
        // C->D 被截掉，其節點不應出現
        assert_eq!(result.payload.nodes, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_transform_csv_output_lists_paths_in_order() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage, MockConfig::new());

        let data = vec![record("A", "B"), record("A", "B"), record("B", "C")];

        let result = pipeline.transform(data).await.unwrap();

        let lines: Vec<&str> = result.csv_output.lines().collect();
        assert_eq!(lines[0], "path,count");
        assert_eq!(lines[1], "A -> B,2");
        assert_eq!(lines[2], "B -> C,1");
    }

    #[test]
    fn test_build_flow_payload_sorts_nodes_and_indexes_links() {
        let top_paths = vec![
            PathCount {
                pair: StationPair::new("zeta", "alpha"),
                count: 5,
            },
            PathCount {
                pair: StationPair::new("alpha", "mid"),
                count: 2,
            },
        ];

        let payload = build_flow_payload(&top_paths);

        assert_eq!(payload.nodes, vec!["alpha", "mid", "zeta"]);
        assert_eq!(payload.links[0], FlowLink {
            source: 2,
            target: 0,
            value: 5
        });
        assert_eq!(payload.links[1], FlowLink {
            source: 0,
            target: 1,
            value: 2
        });

        // 每條連線的索引都必須落在節點範圍內
        for link in &payload.links {
            assert!(link.source < payload.nodes.len());
            assert!(link.target < payload.nodes.len());
        }
    }

    #[test]
    fn test_build_flow_payload_empty_input() {
        let payload = build_flow_payload(&[]);
        assert!(payload.nodes.is_empty());
        assert!(payload.links.is_empty());
    }

    #[test]
    fn test_build_flow_payload_node_set_matches_paths() {
        let top_paths = vec![
            PathCount {
                pair: StationPair::new("A", "B"),
                count: 3,
            },
            PathCount {
                pair: StationPair::new("B", "A"),
                count: 1,
            },
        ];

        let payload = build_flow_payload(&top_paths);

        assert_eq!(payload.nodes, vec!["A", "B"]);
        let total: u64 = payload.links.iter().map(|l| l.value).sum();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_load_writes_payload_paths_and_summary() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(storage.clone(), MockConfig::new());

        let top_paths = vec![PathCount {
            pair: StationPair::new("A", "B"),
            count: 3,
        }];
        let payload = build_flow_payload(&top_paths);
        let result = AnalysisResult {
            top_paths,
            payload,
            csv_output: "path,count\nA -> B,3\n".to_string(),
            total_records: 3,
            skipped_records: 0,
        };

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "test_output/flow.json");

        let flow_bytes = storage.get_file(FLOW_FILENAME).await.unwrap();
        let payload: FlowPayload = serde_json::from_slice(&flow_bytes).unwrap();
        assert_eq!(payload.nodes, vec!["A", "B"]);
        assert_eq!(payload.links.len(), 1);
        assert_eq!(payload.links[0].value, 3);

        let csv_bytes = storage.get_file(TOP_PATHS_FILENAME).await.unwrap();
        assert_eq!(String::from_utf8(csv_bytes).unwrap(), "path,count\nA -> B,3\n");

        let summary_bytes = storage.get_file(SUMMARY_FILENAME).await.unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&summary_bytes).unwrap();
        assert_eq!(summary["total_records"], 3);
        assert_eq!(summary["path_count"], 1);
        assert_eq!(summary["node_count"], 2);
        assert!(summary["generated_at"].is_string());
    }

    #[tokio::test]
    async fn test_load_csv_only_skips_json_outputs() {
        let storage = MockStorage::new();
        let pipeline = FlowPipeline::new(
            storage.clone(),
            MockConfig::new().with_formats(&["csv"]),
        );

        let top_paths = vec![PathCount {
            pair: StationPair::new("A", "B"),
            count: 1,
        }];
        let payload = build_flow_payload(&top_paths);
        let result = AnalysisResult {
            top_paths,
            payload,
            csv_output: "path,count\nA -> B,1\n".to_string(),
            total_records: 1,
            skipped_records: 0,
        };

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "test_output/top_paths.csv");

        assert!(storage.get_file(FLOW_FILENAME).await.is_none());
        assert!(storage.get_file(SUMMARY_FILENAME).await.is_none());
        assert!(storage.get_file(TOP_PATHS_FILENAME).await.is_some());
    }

    #[tokio::test]
    async fn test_end_to_end_through_pipeline_trait() {
        let csv = "SFZRKMC,SFZCKMC\nA,B\nA,B\nB,C\nA,B\n";
        let pipeline = pipeline_with_csv(csv).await;

        let records = pipeline.extract().await.unwrap();
        let result = pipeline.transform(records).await.unwrap();
        let total_valid = result.total_records - result.skipped_records;
        let weight_sum: u64 = result.payload.links.iter().map(|l| l.value).sum();

        assert!(weight_sum <= total_valid as u64);
        assert_eq!(result.top_paths.len(), 2);

        pipeline.load(result).await.unwrap();
    }
}
