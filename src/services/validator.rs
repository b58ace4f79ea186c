//! 文件选择校验 - 业务能力层
//!
//! 纯过滤：把原始选择拆成"接受"和"拒绝"两部分，不做任何 I/O

use std::fmt;

use crate::models::{CandidateFile, FileDescriptor, MAX_FILE_SIZE_BYTES, PNG_MEDIA_TYPE};
use crate::utils::logging::format_file_size;

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 媒体类型不是 PNG
    WrongType,
    /// 超过大小上限
    TooLarge,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WrongType => write!(f, "wrong-type"),
            RejectReason::TooLarge => write!(f, "too-large"),
        }
    }
}

/// 被拒绝的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectReason,
}

impl RejectedFile {
    /// 面向用户的提示文本
    pub fn message(&self, max_bytes: u64) -> String {
        match self.reason {
            RejectReason::WrongType => format!("{} 不是PNG文件", self.name),
            RejectReason::TooLarge => format!(
                "{} 的文件大小超过了{}",
                self.name,
                format_file_size(max_bytes)
            ),
        }
    }
}

/// 校验结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub accepted: Vec<FileDescriptor>,
    pub rejected: Vec<RejectedFile>,
}

impl ValidationReport {
    /// 接受文件的总字节数
    pub fn total_bytes(&self) -> u64 {
        self.accepted.iter().map(|f| f.byte_size()).sum()
    }

    /// 选择摘要，例如 "3个文件已选择 (合计: 1.5 MB)"
    pub fn summary(&self) -> String {
        format!(
            "{}个文件已选择 (合计: {})",
            self.accepted.len(),
            format_file_size(self.total_bytes())
        )
    }
}

/// 选择结果
///
/// "什么都没选" 和 "选了但全部被拒绝" 是两种不同的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    NothingChosen,
    Validated(ValidationReport),
}

/// 文件选择校验器
#[derive(Debug, Clone)]
pub struct FileSetValidator {
    media_type: String,
    max_bytes: u64,
}

impl FileSetValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            media_type: PNG_MEDIA_TYPE.to_string(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// 校验原始选择
    ///
    /// 接受的文件按选择顺序重新编号为 `0..n`
    pub fn validate(&self, candidates: &[CandidateFile]) -> Selection {
        if candidates.is_empty() {
            return Selection::NothingChosen;
        }

        let mut report = ValidationReport::default();
        for candidate in candidates {
            let reason = if candidate.media_type != self.media_type {
                Some(RejectReason::WrongType)
            } else if candidate.byte_size > self.max_bytes {
                Some(RejectReason::TooLarge)
            } else {
                None
            };

            match reason {
                Some(reason) => report.rejected.push(RejectedFile {
                    name: candidate.name.clone(),
                    reason,
                }),
                None => {
                    let index = report.accepted.len();
                    report.accepted.push(FileDescriptor::new(index, candidate));
                }
            }
        }

        Selection::Validated(report)
    }
}

impl Default for FileSetValidator {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE_BYTES)
    }
}
