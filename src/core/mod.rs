pub mod engine;
pub mod pipeline;

pub use crate::domain::model::{
    AnalysisResult, FlowLink, FlowPayload, PathCount, Record, StationPair,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
