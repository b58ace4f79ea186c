//! 分析结果展示数据提取 - 业务能力层
//!
//! 回退顺序固定，三种提交方式共用：
//! 1. `extracted_data` 字段 → 原样使用
//! 2. `text` 字段中的 ```json 代码块 → 解析后使用
//! 3. `text` 原文（解析失败或没有代码块）
//! 4. 整个 payload 的 JSON 输出

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// 提取后的展示数据
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadDisplay {
    /// 服务端直接给出的结构化数据
    Structured(Value),
    /// 从文本的代码块中解析出的数据
    ParsedBlock(Value),
    /// 文本原文
    RawText(String),
    /// 整个 payload
    Dump(Value),
}

impl PayloadDisplay {
    /// 展示用文本
    pub fn render_text(&self) -> String {
        match self {
            PayloadDisplay::Structured(value)
            | PayloadDisplay::ParsedBlock(value)
            | PayloadDisplay::Dump(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            PayloadDisplay::RawText(text) => text.clone(),
        }
    }

    /// 持久化和保存时使用的数据
    pub fn extracted_data(&self) -> Value {
        match self {
            PayloadDisplay::Structured(value)
            | PayloadDisplay::ParsedBlock(value)
            | PayloadDisplay::Dump(value) => value.clone(),
            PayloadDisplay::RawText(text) => Value::String(text.clone()),
        }
    }
}

fn fenced_json_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)```json\s*\n(.*?)\n```").ok())
        .as_ref()
}

/// 查找文本中第一个 ```json 代码块的内容
pub fn find_fenced_json(text: &str) -> Option<&str> {
    if !text.contains("```json") {
        return None;
    }

    fenced_json_pattern()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 解析文本中的 ```json 代码块
///
/// 解析失败不是错误，只记录警告并返回 `None`
pub fn parse_fenced_json(text: &str) -> Option<Value> {
    let block = find_fenced_json(text)?;
    match serde_json::from_str(block) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("⚠️ 无法解析文本中的 JSON 代码块: {}", e);
            None
        }
    }
}

/// 按固定回退顺序提取展示数据
pub fn extract_display(payload: Option<&Value>) -> PayloadDisplay {
    let Some(payload) = payload else {
        return PayloadDisplay::Dump(Value::Null);
    };

    if let Some(data) = payload.get("extracted_data").filter(|v| !v.is_null()) {
        return PayloadDisplay::Structured(data.clone());
    }

    if let Some(text) = payload
        .get("text")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
    {
        return match parse_fenced_json(text) {
            Some(parsed) => PayloadDisplay::ParsedBlock(parsed),
            None => PayloadDisplay::RawText(text.to_string()),
        };
    }

    PayloadDisplay::Dump(payload.clone())
}
