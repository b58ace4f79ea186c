//! # Analysis Submit
//!
//! 把一组 PNG 图片提交给远程分析服务，并把逐文件的结果汇总、缓存、重试
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 分析服务的能力接口
//! - `AnalysisApi` - 提交 / 轮询 / 推送 / 重试 / 清理 / 保存
//! - `StatusStream` - 有限、不可重启的推送消息流
//! - `clients/` - 基于 reqwest 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `FileSetValidator` - 文件选择校验
//! - `ProcessingMode` - 提交方式选择
//! - `PayloadDisplay` - 结果提取（结构化 → 代码块 → 原文 → 整体）
//! - `Presenter` / `ResultMirror` - 展示与缓存
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个会话"的状态与合并规则
//! - `SessionTracker` - 逐文件状态表，唯一的合并入口
//! - `AggregateView` - 按索引排序的结果视图
//! - `CompletionDecision` - 终态时清理或保留会话
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/submission` - 校验并提交
//! - `orchestrator/session_loop` - 轮询 / 推送循环
//! - `orchestrator/retry` - 失败重试
//! - `orchestrator/batch_processor` - 命令行宿主
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::AnalysisClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{AnalysisApi, StatusStream};
pub use models::{CandidateFile, FileDescriptor, FileResult};
pub use orchestrator::{App, Orchestrator, SessionContext, SubmissionOptions, SubmissionOutcome};
pub use services::{Presenter, ProcessingMode};
pub use workflow::{AggregateView, SessionTracker};
