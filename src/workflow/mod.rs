pub mod item_ctx;
pub mod pipeline_flow;

pub use item_ctx::ItemCtx;
pub use pipeline_flow::{PipelineFlow, StageReport, DEFAULT_RENDER_TIMEOUT};
