//! 失败重试 - 编排层
//!
//! 只针对当前失败的文件，沿用原会话和原提交方式，结果游标从 0 开始

use tracing::info;

use crate::clients::endpoints;
use crate::error::{AppError, AppResult, SessionError};
use crate::orchestrator::submission::{Orchestrator, SessionContext};
use crate::services::{BusyGuard, MessageLevel};

impl Orchestrator {
    /// 重试失败的文件
    ///
    /// 调用时立即隐藏重试按钮，只有重试请求没能启动时才重新显示
    pub async fn retry_failed(&self, ctx: Option<&mut SessionContext>) -> AppResult<()> {
        let Some(ctx) = ctx else {
            let err = AppError::from(SessionError::NoActiveSession);
            self.report_failure(&err);
            return Err(err);
        };

        self.presenter.set_retry_visible(false);

        let targets = match ctx.tracker.begin_retry() {
            Ok(targets) => targets,
            Err(e) => {
                self.report_failure(&e);
                return Err(e);
            }
        };

        let _busy = BusyGuard::new(self.presenter.as_ref());
        info!(
            "[会话 {}] 🔁 重试 {} 个失败文件: {:?}",
            ctx.session_id(),
            targets.len(),
            targets
        );

        let started = match self.api.retry_failed(ctx.session_id()).await {
            Ok(response) if response.success => Ok(response),
            Ok(response) => Err(AppError::api_rejected(
                endpoints::session_retry_url("", ctx.session_id()),
                response.error.unwrap_or_else(|| "未知错误".to_string()),
            )),
            Err(e) => Err(e),
        };

        let response = match started {
            Ok(response) => response,
            Err(e) => {
                ctx.tracker.abort_retry(&targets);
                self.presenter.set_retry_visible(true);
                self.report_failure(&e);
                return Err(e);
            }
        };

        let message = response
            .message
            .unwrap_or_else(|| format!("开始重试 {} 个失败文件", targets.len()));
        self.presenter.show_message(MessageLevel::Info, &message);

        ctx.last_decision = None;
        ctx.interrupted = None;
        self.publish(&ctx.view()).await;

        if let Err(e) = self.drive(ctx).await {
            self.report_failure(&e);
            ctx.interrupted = Some(e.to_string());
            return Err(e);
        }
        Ok(())
    }
}
