//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责取候选和批量调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `work_queue` - 待处理队列
//! - 按阶段找出满足前置条件的条目
//! - 按创建时间倒序，每次最多 10 个
//!
//! ### `batch_processor` - 批量处理器
//! - 组装存储和外部客户端
//! - 控制并发数量（Semaphore）
//! - 输出批次统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ContentItem>)
//!     ↓
//! workflow::PipelineFlow (处理单个条目的单个阶段)
//!     ↓
//! services (能力层：script / speech / captions / render)
//!     ↓
//! infrastructure (基础设施：ContentStore)
//! ```

pub mod batch_processor;
pub mod work_queue;

// 重新导出主要类型
pub use batch_processor::{App, BatchStats};
pub use work_queue::{WorkQueue, PAGE_SIZE};
