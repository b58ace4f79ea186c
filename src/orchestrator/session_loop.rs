//! 会话循环 - 编排层
//!
//! 轮询和推送两条路径把消息转换成 `StatusEvent`，交给同一个合并逻辑。
//! 同一时间每个会话只有一个循环：循环独占 `&mut SessionContext`。

use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::StatusEvent;
use crate::orchestrator::submission::{Orchestrator, SessionContext};
use crate::services::{BusyGuard, MessageLevel, ProcessingMode};
use crate::utils::truncate_text;

impl Orchestrator {
    /// 按会话的提交方式跟踪到终态
    pub(super) async fn drive(&self, ctx: &mut SessionContext) -> AppResult<()> {
        match ctx.mode {
            ProcessingMode::StreamedIterator => self.stream_until_terminal(ctx).await,
            _ => self.poll_until_terminal(ctx).await,
        }
    }

    /// 传输错误中断后重新跟踪同一个会话
    pub async fn resume(&self, ctx: &mut SessionContext) -> AppResult<()> {
        if ctx.phase().is_terminal() {
            debug!("[会话 {}] 已到终态，无需恢复", ctx.session_id());
            return Ok(());
        }

        let _busy = BusyGuard::new(self.presenter.as_ref());
        info!("[会话 {}] 🔄 恢复跟踪", ctx.session_id());
        ctx.interrupted = None;

        let result = self.drive(ctx).await;
        if let Err(e) = &result {
            self.report_failure(e);
            ctx.interrupted = Some(e.to_string());
        }
        result
    }

    /// 固定间隔轮询，直到服务端声明完成
    async fn poll_until_terminal(&self, ctx: &mut SessionContext) -> AppResult<()> {
        loop {
            tokio::time::sleep(self.options.poll_interval).await;

            let status = self
                .api
                .session_status(ctx.session_id(), ctx.tracker.result_cursor())
                .await
                .map_err(|e| {
                    error!("[会话 {}] ❌ 状态查询失败: {}", ctx.session_id(), e);
                    e
                })?;

            if self.handle_event(ctx, StatusEvent::from(status)).await {
                return Ok(());
            }
        }
    }

    /// 消费推送通道，终态（成功或失败）时显式关闭
    async fn stream_until_terminal(&self, ctx: &mut SessionContext) -> AppResult<()> {
        let mut stream = self.api.open_stream(ctx.session_id()).await?;

        let result = loop {
            match stream.next_message().await {
                Some(Ok(message)) => {
                    let mut event = StatusEvent::from(message);

                    // 带错误的消息只合并其中的结果，不能当作完成信号
                    if let Some(message) = event.error.take() {
                        event.completed = false;
                        self.handle_event(ctx, event).await;
                        error!("[会话 {}] ❌ 推送通道报告错误: {}", ctx.session_id(), message);
                        break Err(AppError::stream_failed(ctx.session_id(), message));
                    }

                    if self.handle_event(ctx, event).await {
                        break Ok(());
                    }
                }
                Some(Err(e)) => {
                    error!("[会话 {}] ❌ 推送通道读取失败: {}", ctx.session_id(), e);
                    break Err(e);
                }
                None => {
                    break Err(AppError::stream_failed(
                        ctx.session_id(),
                        "推送通道在完成前关闭",
                    ))
                }
            }
        };

        stream.close();
        result
    }

    /// 合并一次状态事件，返回是否到达终态
    async fn handle_event(&self, ctx: &mut SessionContext, event: StatusEvent) -> bool {
        if let (Some(processed), Some(total)) = (event.processed_files, event.total_files) {
            if total > 0 {
                let percentage = event
                    .progress_percentage
                    .unwrap_or(processed as f64 * 100.0 / total as f64);
                self.presenter.show_message(
                    MessageLevel::Info,
                    &format!("处理中: {}/{} 完成 ({:.0}%)", processed, total, percentage),
                );
            }
        }

        for item in &event.errors {
            warn!(
                "[会话 {}] ⚠️ 处理错误: {}",
                ctx.session_id(),
                truncate_text(&item.to_string(), 200)
            );
        }

        let outcome = ctx.tracker.apply(&event);
        if outcome.dropped > 0 {
            debug!(
                "[会话 {}] 丢弃 {} 条过期或越界的结果",
                ctx.session_id(),
                outcome.dropped
            );
        }

        if outcome.completed {
            self.on_terminal(ctx).await;
            return true;
        }

        if outcome.changed() {
            self.publish(&ctx.view()).await;
        }
        false
    }

    /// 终态收尾：全部成功则清理会话，否则保留会话并显示重试
    async fn on_terminal(&self, ctx: &mut SessionContext) {
        let decision = ctx.tracker.finish();
        self.publish(&ctx.view()).await;

        if decision.cleanup {
            self.presenter.set_retry_visible(false);
            if !ctx.cleanup_issued {
                ctx.cleanup_issued = true;
                if let Err(e) = self.api.cleanup_session(ctx.session_id()).await {
                    warn!("[会话 {}] ⚠️ 清理会话失败: {}", ctx.session_id(), e);
                }
            }
            let elapsed = chrono::Local::now() - ctx.tracker.session().created_at();
            info!(
                "[会话 {}] ✅ 全部文件处理完成 (耗时 {} 秒)",
                ctx.session_id(),
                elapsed.num_seconds()
            );
            self.presenter.show_message(
                MessageLevel::Success,
                &format!("全部 {} 个文件分析完成", ctx.tracker.session().total_files()),
            );
        } else {
            warn!(
                "[会话 {}] ⚠️ {} 个文件处理失败: {:?}",
                ctx.session_id(),
                decision.failed_count(),
                decision.failed_indices
            );
            self.presenter.show_message(
                MessageLevel::Warning,
                &format!("{} 个文件分析失败，可以重试", decision.failed_count()),
            );
            self.presenter.set_retry_visible(true);
        }

        ctx.last_decision = Some(decision);
    }
}
