//! 分析服务的请求 / 响应结构
//!
//! 只包含客户端实际读取的字段，其余字段在反序列化时忽略

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::result::FileResult;

/// 一次性批量分析中单个文件的结果
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub result: Option<Value>,
}

/// 一次性批量分析响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<BatchItem>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 逐个处理 / 推送模式的启动响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub total_files: Option<usize>,
    #[serde(default)]
    pub error: Option<String>,
}

fn first_attempt() -> u32 {
    1
}

/// 服务端当前正在处理的文件（仅供参考）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CurrentProcessing {
    pub file_index: usize,
    #[serde(default = "first_attempt")]
    pub current_attempt: u32,
}

/// 轮询状态响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub processed_files: usize,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub current_processing: Option<CurrentProcessing>,
    #[serde(default)]
    pub new_results: Vec<FileResult>,
    #[serde(default)]
    pub total_results_count: Option<usize>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// 推送通道中的单条消息
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub processed_files: Option<usize>,
    #[serde(default)]
    pub total_files: Option<usize>,
    #[serde(default)]
    pub current_processing: Option<CurrentProcessing>,
    #[serde(default)]
    pub results: Vec<FileResult>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamMessage {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

/// 重试响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RetryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 保存结果时提交的单条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedRecord {
    pub filename: String,
    pub file_index: usize,
    pub extracted_data: Value,
    pub completed_at: Option<String>,
    pub elapsed_seconds: Option<f64>,
}

/// 保存结果请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub results: Vec<SavedRecord>,
}

/// 保存结果响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 轮询与推送共用的状态事件
///
/// 两种来源都先转换成这个结构，再交给同一个合并逻辑
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusEvent {
    pub processed_files: Option<usize>,
    pub total_files: Option<usize>,
    pub progress_percentage: Option<f64>,
    pub current_processing: Option<CurrentProcessing>,
    pub results: Vec<FileResult>,
    /// 服务端已知的结果总数，作为下一次轮询的游标
    pub result_cursor: Option<usize>,
    pub completed: bool,
    pub errors: Vec<Value>,
    /// 推送通道报告的错误，对通道而言是终止信号
    pub error: Option<String>,
}

impl From<StatusResponse> for StatusEvent {
    fn from(status: StatusResponse) -> Self {
        Self {
            processed_files: Some(status.processed_files),
            total_files: Some(status.total_files),
            progress_percentage: Some(status.progress_percentage),
            current_processing: status.current_processing,
            results: status.new_results,
            result_cursor: status.total_results_count,
            completed: status.completed,
            errors: status.errors,
            error: None,
        }
    }
}

impl From<StreamMessage> for StatusEvent {
    fn from(message: StreamMessage) -> Self {
        let completed = message.is_completed();
        let progress_percentage = match (message.processed_files, message.total_files) {
            (Some(processed), Some(total)) if total > 0 => {
                Some(processed as f64 * 100.0 / total as f64)
            }
            _ => None,
        };

        Self {
            processed_files: message.processed_files,
            total_files: message.total_files,
            progress_percentage,
            current_processing: message.current_processing,
            results: message.results,
            result_cursor: None,
            completed,
            errors: Vec::new(),
            error: message.error,
        }
    }
}
