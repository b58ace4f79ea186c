use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分析服务返回的原始数据，结构由服务端决定
pub type AnalysisPayload = Value;

/// 单个文件的分析结果
///
/// 同一个 `file_index` 只保留一条记录，后到的结果覆盖先到的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub file_index: usize,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, rename = "result")]
    pub payload: Option<AnalysisPayload>,
    /// 推送消息中通常没有这个字段，合并时按文件当前的尝试次数补齐
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub elapsed_seconds: Option<f64>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl FileResult {
    /// 构建一次性批量结果（没有会话，尝试次数固定为 1）
    pub fn from_batch(file_index: usize, filename: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            file_index,
            filename: filename.into(),
            failed: false,
            payload,
            attempt: Some(1),
            elapsed_seconds: None,
            completed_at: None,
        }
    }

    /// 尝试次数，缺省或为 0 时视为第一次
    pub fn attempt(&self) -> u32 {
        self.attempt.unwrap_or(1).max(1)
    }

    /// 补齐缺省的尝试次数
    ///
    /// 服务端偶尔会返回 attempt=0，同样视为第一次尝试
    pub fn resolve_attempt(mut self, fallback: u32) -> Self {
        self.attempt = Some(self.attempt.unwrap_or(fallback).max(1));
        self
    }
}
