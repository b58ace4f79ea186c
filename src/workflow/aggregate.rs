//! 结果汇总视图 - 流程层
//!
//! 每次合并后重新计算，始终按 `file_index` 排序

use serde_json::Value;

use crate::models::{FileResult, SavedRecord};
use crate::services::payload::{extract_display, PayloadDisplay};

/// 视图中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateEntry {
    pub file_index: usize,
    pub filename: String,
    pub failed: bool,
    pub attempt: u32,
    pub elapsed_seconds: Option<f64>,
    pub completed_at: Option<String>,
    pub display: PayloadDisplay,
}

/// 按索引排序的结果视图
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateView {
    entries: Vec<AggregateEntry>,
}

impl AggregateView {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a FileResult>) -> Self {
        let mut entries: Vec<AggregateEntry> = results
            .into_iter()
            .map(|result| AggregateEntry {
                file_index: result.file_index,
                filename: result.filename.clone(),
                failed: result.failed,
                attempt: result.attempt(),
                elapsed_seconds: result.elapsed_seconds,
                completed_at: result.completed_at.clone(),
                display: extract_display(result.payload.as_ref()),
            })
            .collect();
        entries.sort_by_key(|entry| entry.file_index);
        Self { entries }
    }

    pub fn entries(&self) -> &[AggregateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.failed).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.len() - self.failed_count()
    }

    /// 成功结果的提取数据，数组会被展开成平铺序列
    pub fn flat_extracted_data(&self) -> Vec<Value> {
        let mut records = Vec::new();
        for entry in self.entries.iter().filter(|e| !e.failed) {
            match entry.display.extracted_data() {
                Value::Array(items) => records.extend(items),
                Value::Null => {}
                other => records.push(other),
            }
        }
        records
    }

    /// 提交到保存接口的记录（只包含成功的文件）
    pub fn save_records(&self) -> Vec<SavedRecord> {
        self.entries
            .iter()
            .filter(|e| !e.failed)
            .map(|entry| SavedRecord {
                filename: entry.filename.clone(),
                file_index: entry.file_index,
                extracted_data: entry.display.extracted_data(),
                completed_at: entry.completed_at.clone(),
                elapsed_seconds: entry.elapsed_seconds,
            })
            .collect()
    }

    /// 终端输出用的文本
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let mut title = format!("文件 {}: {}", entry.file_index + 1, entry.filename);
            if entry.attempt > 1 {
                title.push_str(&format!(" (第 {} 次尝试)", entry.attempt));
            }
            if entry.failed {
                title.push_str(" ❌ 失败");
            }
            out.push_str(&title);
            out.push('\n');
            out.push_str(&entry.display.render_text());
            out.push_str("\n\n");
        }
        out
    }
}
