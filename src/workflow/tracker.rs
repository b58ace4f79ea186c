//! 会话跟踪 - 流程层
//!
//! 持有一个会话的逐文件状态表，是唯一会修改状态表的地方。
//!
//! 文件状态：`Pending → Processing(N) → Completed(N) | Failed(N)`，
//! `Failed(N)` 只能通过重试进入 `Processing(N+1)`。
//!
//! 会话阶段：`Active → Completing → Closed | Retryable`。
//!
//! 合并规则：以 `file_index` 为键覆盖，`attempt` 单调不减。
//! 同一个结果重复合并不会改变任何状态，乱序到达也不会破坏结果。

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{AppResult, SessionError};
use crate::models::{CurrentProcessing, FileResult, Session, StatusEvent};
use crate::workflow::aggregate::AggregateView;
use crate::workflow::completion::CompletionDecision;

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Processing {
        attempt: u32,
        /// 服务端提示"正在重试"，仅供参考
        retrying: bool,
    },
    Completed {
        attempt: u32,
    },
    Failed {
        attempt: u32,
    },
}

impl SlotState {
    /// 当前尝试次数，未开始为 0
    pub fn attempt(&self) -> u32 {
        match self {
            SlotState::Pending => 0,
            SlotState::Processing { attempt, .. }
            | SlotState::Completed { attempt }
            | SlotState::Failed { attempt } => *attempt,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotState::Completed { .. } | SlotState::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SlotState::Failed { .. })
    }
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// 正在处理
    Active,
    /// 服务端已声明完成，等待收尾判断
    Completing,
    /// 全部成功，已请求清理
    Closed,
    /// 存在失败文件，会话保留以便重试
    Retryable,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Closed | SessionPhase::Retryable)
    }
}

/// 单条结果的合并结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// 首次出现
    Inserted,
    /// 覆盖了旧结果
    Replaced,
    /// 与已有结果完全相同
    Unchanged,
    /// 尝试次数比已有结果小，丢弃
    Stale,
    /// 索引超出会话范围，丢弃
    OutOfRange,
}

/// 一次状态事件的合并统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: usize,
    pub unchanged: usize,
    pub dropped: usize,
    pub completed: bool,
}

impl MergeOutcome {
    /// 结果视图是否发生了变化
    pub fn changed(&self) -> bool {
        self.merged > 0
    }
}

/// 会话跟踪器
#[derive(Debug, Clone)]
pub struct SessionTracker {
    session: Session,
    slots: Vec<SlotState>,
    results: BTreeMap<usize, FileResult>,
    phase: SessionPhase,
    result_cursor: usize,
}

impl SessionTracker {
    pub fn new(session: Session) -> Self {
        let slots = vec![SlotState::Pending; session.total_files()];
        Self {
            session,
            slots,
            results: BTreeMap::new(),
            phase: SessionPhase::Active,
            result_cursor: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).copied()
    }

    pub fn result(&self, index: usize) -> Option<&FileResult> {
        self.results.get(&index)
    }

    /// 下一次轮询时告诉服务端的已知结果数
    pub fn result_cursor(&self) -> usize {
        self.result_cursor
    }

    /// 当前处于失败状态的文件索引
    pub fn failed_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_failed())
            .map(|(index, _)| index)
            .collect()
    }

    /// 按索引排序的结果视图
    pub fn view(&self) -> AggregateView {
        AggregateView::from_results(self.results.values())
    }

    /// 记录服务端提示的"正在处理"文件
    ///
    /// 只是提示：不会把同次或更高次尝试的终态文件拉回处理中
    pub fn mark_processing(&mut self, current: &CurrentProcessing) -> bool {
        let Some(slot) = self.slots.get_mut(current.file_index) else {
            warn!(
                "[会话 {}] 忽略超出范围的处理中索引: {}",
                self.session.session_id(),
                current.file_index
            );
            return false;
        };

        let attempt = current.current_attempt.max(1);
        let should_update = match slot {
            SlotState::Pending => true,
            SlotState::Processing { attempt: known, .. } => attempt >= *known,
            SlotState::Completed { attempt: known } | SlotState::Failed { attempt: known } => {
                attempt > *known
            }
        };

        if should_update {
            *slot = SlotState::Processing {
                attempt,
                retrying: attempt > 1,
            };
        }
        should_update
    }

    /// 合并单条结果
    pub fn merge_result(&mut self, result: FileResult) -> MergeResult {
        let index = result.file_index;

        let Some(slot) = self.slots.get_mut(index) else {
            warn!(
                "[会话 {}] 忽略超出范围的结果索引: {} (共 {} 个文件)",
                self.session.session_id(),
                index,
                self.session.total_files()
            );
            return MergeResult::OutOfRange;
        };

        // 没有 attempt 的结果属于该文件当前这一次尝试
        let result = result.resolve_attempt(slot.attempt());
        let attempt = result.attempt();

        let outcome = match self.results.get(&index) {
            Some(stored) if attempt < stored.attempt() => {
                debug!(
                    "丢弃过期结果: 文件 {} 尝试 {} < {}",
                    index,
                    attempt,
                    stored.attempt()
                );
                return MergeResult::Stale;
            }
            Some(stored) if *stored == result => MergeResult::Unchanged,
            Some(_) => MergeResult::Replaced,
            None => MergeResult::Inserted,
        };

        // 重试期间可能再次收到旧一轮的同次结果，此时只更新结果，不回退文件状态
        if attempt >= slot.attempt() {
            *slot = if result.failed {
                SlotState::Failed { attempt }
            } else {
                SlotState::Completed { attempt }
            };
        }

        if outcome != MergeResult::Unchanged {
            self.results.insert(index, result);
        }
        outcome
    }

    /// 合并一次状态事件
    ///
    /// 是否完成只看服务端的 `completed` 标志，不根据计数推断
    pub fn apply(&mut self, event: &StatusEvent) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        if let Some(current) = &event.current_processing {
            self.mark_processing(current);
        }

        for result in &event.results {
            match self.merge_result(result.clone()) {
                MergeResult::Inserted | MergeResult::Replaced => outcome.merged += 1,
                MergeResult::Unchanged => outcome.unchanged += 1,
                MergeResult::Stale | MergeResult::OutOfRange => outcome.dropped += 1,
            }
        }

        if let Some(cursor) = event.result_cursor {
            self.result_cursor = cursor;
        }

        if event.completed && self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Completing;
        }
        outcome.completed = event.completed;
        outcome
    }

    /// 服务端声明完成后的收尾
    ///
    /// 仍未到终态的文件：有已存结果则按结果定性，否则视为失败。
    /// 每次终止信号都会重新计算，不缓存。
    pub fn finish(&mut self) -> CompletionDecision {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_terminal() {
                continue;
            }
            *slot = match self.results.get(&index) {
                Some(stored) if !stored.failed && stored.attempt() >= slot.attempt() => {
                    SlotState::Completed {
                        attempt: stored.attempt(),
                    }
                }
                Some(stored) => SlotState::Failed {
                    attempt: stored.attempt().max(slot.attempt()),
                },
                None => SlotState::Failed {
                    attempt: slot.attempt().max(1),
                },
            };
        }

        let decision = CompletionDecision::evaluate(&self.slots);
        self.phase = decision.phase();
        decision
    }

    /// 开始重试：只把失败的文件推进到下一次尝试
    ///
    /// 结果游标归零，避免漏掉服务端原地改写的结果
    pub fn begin_retry(&mut self) -> AppResult<Vec<usize>> {
        match self.phase {
            SessionPhase::Retryable => {}
            SessionPhase::Active | SessionPhase::Completing => {
                return Err(SessionError::RetryInFlight {
                    session_id: self.session.session_id().to_string(),
                }
                .into())
            }
            SessionPhase::Closed => {
                return Err(SessionError::NotRetryable {
                    session_id: self.session.session_id().to_string(),
                }
                .into())
            }
        }

        let targets = self.failed_indices();
        if targets.is_empty() {
            return Err(SessionError::NotRetryable {
                session_id: self.session.session_id().to_string(),
            }
            .into());
        }

        for &index in &targets {
            let attempt = self.slots[index].attempt() + 1;
            self.slots[index] = SlotState::Processing {
                attempt,
                retrying: true,
            };
        }

        self.phase = SessionPhase::Active;
        self.result_cursor = 0;
        Ok(targets)
    }

    /// 重试请求没能启动时撤销 `begin_retry`
    pub fn abort_retry(&mut self, targets: &[usize]) {
        for &index in targets {
            if let Some(slot) = self.slots.get_mut(index) {
                if let SlotState::Processing { attempt, .. } = *slot {
                    *slot = SlotState::Failed {
                        attempt: attempt.saturating_sub(1).max(1),
                    };
                }
            }
        }
        self.phase = SessionPhase::Retryable;
    }
}
