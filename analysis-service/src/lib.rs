pub mod collector;
pub mod pipeline;
pub mod task_group;

pub use collector::{flatten_comments, search_query, PostCollector};
pub use pipeline::{AnalysisPipeline, AnalysisRequest, PipelineStage, PostScoring};
pub use task_group::run_isolated;
