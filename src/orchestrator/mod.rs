//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次提交的完整调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `submission` - 提交编排
//! - 校验文件选择，没有可提交文件时不发请求
//! - 按提交方式发起请求（一次性批量 / 逐个轮询 / 推送）
//! - 会话模式返回 `SessionContext`，不存在全局的当前会话
//! - 保存结果
//!
//! ### `session_loop` - 会话循环
//! - 固定间隔轮询，携带结果游标
//! - 消费推送通道，终态时显式关闭
//! - 终态收尾：清理会话或显示重试
//!
//! ### `retry` - 失败重试
//! - 只重试失败的文件，沿用原会话和原提交方式
//!
//! ### `batch_processor` - 命令行宿主
//! - 管理应用生命周期（初始化、运行）
//! - 自动重试、保存结果、输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (命令行宿主)
//!     ↓
//! submission / session_loop / retry (一次提交)
//!     ↓
//! workflow::SessionTracker (逐文件状态与合并)
//!     ↓
//! services (能力层：校验 / 提取 / 展示 / 缓存)
//!     ↓
//! infrastructure (AnalysisApi)
//! ```
//!
//! ## 设计原则
//!
//! 1. **显式上下文**：会话状态跟随 `SessionContext` 传递
//! 2. **单一合并入口**：轮询和推送共用同一个合并逻辑
//! 3. **忙碌状态必恢复**：所有路径都由 `BusyGuard` 收尾
//! 4. **每个失败只提示一次**

pub mod batch_processor;
pub mod retry;
pub mod session_loop;
pub mod submission;

// 重新导出主要类型
pub use batch_processor::App;
pub use submission::{Orchestrator, SessionContext, SubmissionOptions, SubmissionOutcome};
