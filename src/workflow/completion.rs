//! 完成判断 - 流程层
//!
//! 终态时二选一：全部成功 → 请求清理；存在失败 → 保留会话并显示重试

use crate::workflow::tracker::{SessionPhase, SlotState};

/// 终态判断结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionDecision {
    /// 失败文件的索引
    pub failed_indices: Vec<usize>,
    /// 是否请求服务端清理会话
    pub cleanup: bool,
    /// 是否显示重试按钮
    pub show_retry: bool,
}

impl CompletionDecision {
    /// 根据终态文件状态计算
    pub fn evaluate(slots: &[SlotState]) -> Self {
        let failed_indices: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_failed())
            .map(|(index, _)| index)
            .collect();

        let has_failures = !failed_indices.is_empty();
        Self {
            failed_indices,
            cleanup: !has_failures,
            show_retry: has_failures,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed_indices.len()
    }

    /// 对应的会话阶段
    pub fn phase(&self) -> SessionPhase {
        if self.cleanup {
            SessionPhase::Closed
        } else {
            SessionPhase::Retryable
        }
    }
}
