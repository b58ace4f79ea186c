//! 提交编排 - 编排层
//!
//! 校验 → 选择提交方式 → 发起请求。
//! 一次性批量提交在这里直接结束；会话模式把 `SessionContext` 交给会话循环。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clients::endpoints;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ValidationError};
use crate::infrastructure::AnalysisApi;
use crate::models::{
    CandidateFile, FileDescriptor, FileResult, SaveRequest, SaveResponse, Session, StartResponse,
};
use crate::services::{
    BusyGuard, FileSetValidator, MessageLevel, Presenter, ProcessingMode, ResultMirror, Selection,
};
use crate::workflow::{AggregateView, CompletionDecision, SessionPhase, SessionTracker};

/// 提交参数
#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    pub mode: ProcessingMode,
    pub poll_interval: Duration,
    pub max_file_size_bytes: u64,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SubmissionOptions {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.processing_mode,
            poll_interval: config.poll_interval(),
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }
}

/// 一个会话的全部客户端状态
///
/// 由提交返回，重试时再传回来，不存在全局的"当前会话"
#[derive(Debug)]
pub struct SessionContext {
    pub(super) tracker: SessionTracker,
    pub(super) mode: ProcessingMode,
    pub(super) cleanup_issued: bool,
    pub(super) last_decision: Option<CompletionDecision>,
    pub(super) interrupted: Option<String>,
}

impl SessionContext {
    pub(super) fn new(session: Session, mode: ProcessingMode) -> Self {
        Self {
            tracker: SessionTracker::new(session),
            mode,
            cleanup_issued: false,
            last_decision: None,
            interrupted: None,
        }
    }

    pub fn session_id(&self) -> &str {
        self.tracker.session_id()
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn phase(&self) -> SessionPhase {
        self.tracker.phase()
    }

    pub fn view(&self) -> AggregateView {
        self.tracker.view()
    }

    /// 是否已经请求过清理
    pub fn cleanup_issued(&self) -> bool {
        self.cleanup_issued
    }

    /// 最近一次终态判断
    pub fn last_decision(&self) -> Option<&CompletionDecision> {
        self.last_decision.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.tracker.phase() == SessionPhase::Retryable
    }

    /// 轮询 / 推送因传输错误中断时的错误信息，服务端会话保持原样
    pub fn interrupted(&self) -> Option<&str> {
        self.interrupted.as_deref()
    }
}

/// 一次提交的结果
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// 一次性批量提交，响应即最终结果
    Batch(AggregateView),
    /// 会话模式，已经运行到终态或中断
    Session(SessionContext),
}

impl SubmissionOutcome {
    pub fn view(&self) -> AggregateView {
        match self {
            SubmissionOutcome::Batch(view) => view.clone(),
            SubmissionOutcome::Session(ctx) => ctx.view(),
        }
    }
}

/// 提交编排器
pub struct Orchestrator {
    pub(super) api: Arc<dyn AnalysisApi>,
    pub(super) presenter: Arc<dyn Presenter>,
    pub(super) mirror: Option<ResultMirror>,
    pub(super) validator: FileSetValidator,
    pub(super) options: SubmissionOptions,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        presenter: Arc<dyn Presenter>,
        options: SubmissionOptions,
    ) -> Self {
        Self {
            api,
            presenter,
            mirror: None,
            validator: FileSetValidator::new(options.max_file_size_bytes),
            options,
        }
    }

    /// 每次结果变化时同步写入缓存
    pub fn with_mirror(mut self, mirror: ResultMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn options(&self) -> &SubmissionOptions {
        &self.options
    }

    /// 提交一次文件选择
    ///
    /// 没有可提交的文件时不会发出任何请求
    pub async fn submit(&self, candidates: &[CandidateFile]) -> AppResult<SubmissionOutcome> {
        let report = match self.validator.validate(candidates) {
            Selection::NothingChosen => {
                let err = AppError::from(ValidationError::NoFilesChosen);
                self.report_failure(&err);
                return Err(err);
            }
            Selection::Validated(report) => report,
        };

        for rejected in &report.rejected {
            self.presenter.show_message(
                MessageLevel::Warning,
                &rejected.message(self.validator.max_bytes()),
            );
        }

        if report.accepted.is_empty() {
            let err = AppError::from(ValidationError::NoAcceptedFiles {
                rejected: report.rejected.len(),
            });
            self.report_failure(&err);
            return Err(err);
        }

        self.presenter.show_message(MessageLevel::Info, &report.summary());

        let _busy = BusyGuard::new(self.presenter.as_ref());
        let mode = self.options.mode;
        info!("📤 开始提交 {} 个文件 (模式: {})", report.accepted.len(), mode);

        let result = if mode.uses_session() {
            self.submit_session(mode, &report.accepted)
                .await
                .map(SubmissionOutcome::Session)
        } else {
            self.submit_batch(&report.accepted)
                .await
                .map(SubmissionOutcome::Batch)
        };

        if let Err(e) = &result {
            self.report_failure(e);
        }
        result
    }

    async fn submit_batch(&self, files: &[FileDescriptor]) -> AppResult<AggregateView> {
        let response = self.api.analyze_batch(files).await?;
        if !response.success {
            return Err(AppError::api_rejected(
                endpoints::ANALYZE_MULTIPLE,
                response.error.unwrap_or_else(|| "未知错误".to_string()),
            ));
        }

        let results: Vec<FileResult> = response
            .results
            .into_iter()
            .enumerate()
            .map(|(index, item)| FileResult::from_batch(index, item.filename, item.result))
            .collect();
        let view = AggregateView::from_results(&results);

        self.publish(&view).await;
        self.presenter.show_message(
            MessageLevel::Success,
            &format!("分析完成: {} 个文件", view.len()),
        );
        Ok(view)
    }

    /// 启动会话并一直跟踪到终态
    ///
    /// 启动失败返回错误；启动之后的传输错误记录在上下文里，会话保留给调用方恢复
    async fn submit_session(
        &self,
        mode: ProcessingMode,
        files: &[FileDescriptor],
    ) -> AppResult<SessionContext> {
        let (endpoint, response) = match mode {
            ProcessingMode::StreamedIterator => (
                endpoints::ANALYZE_ITERATOR,
                self.api.start_iterator(files).await?,
            ),
            _ => (
                endpoints::ANALYZE_SEQUENTIAL,
                self.api.start_sequential(files).await?,
            ),
        };

        let session = session_from_start(endpoint, response, files.len())?;
        info!(
            "[会话 {}] 🚀 会话已创建，共 {} 个文件",
            session.session_id(),
            session.total_files()
        );
        self.presenter.show_message(
            MessageLevel::Info,
            &format!("开始逐个处理 {} 个文件", session.total_files()),
        );

        let mut ctx = SessionContext::new(session, mode);
        if let Err(e) = self.drive(&mut ctx).await {
            self.report_failure(&e);
            ctx.interrupted = Some(e.to_string());
        }
        Ok(ctx)
    }

    /// 把成功的结果提交到保存接口
    pub async fn save_results(&self, view: &AggregateView) -> AppResult<SaveResponse> {
        let records = view.save_records();
        if records.is_empty() {
            let err = AppError::from(ValidationError::NothingToSave);
            self.report_failure(&err);
            return Err(err);
        }

        let _busy = BusyGuard::new(self.presenter.as_ref());
        let count = records.len();
        let request = SaveRequest { results: records };

        let response = match self.api.save_results(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.report_failure(&e);
                return Err(e);
            }
        };

        if let Some(message) = response.error.clone() {
            let err = AppError::api_rejected(endpoints::SAVE_RESULTS, message);
            self.report_failure(&err);
            return Err(err);
        }

        let message = response
            .message
            .clone()
            .unwrap_or_else(|| format!("已保存 {} 条结果", count));
        self.presenter.show_message(MessageLevel::Success, &message);
        Ok(response)
    }

    /// 渲染并写入缓存，缓存失败只记录日志
    pub(super) async fn publish(&self, view: &AggregateView) {
        self.presenter.render(view);
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.mirror(view).await {
                warn!("⚠️ 结果缓存写入失败: {}", e);
            }
        }
    }

    /// 每个失败事件只显示一次
    pub(super) fn report_failure(&self, err: &AppError) {
        debug!("失败事件: {:?}", err);
        let text = err
            .server_message()
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.to_string());
        self.presenter.show_error(&text);
    }
}

/// 校验启动响应并构建会话
fn session_from_start(
    endpoint: &str,
    response: StartResponse,
    submitted: usize,
) -> AppResult<Session> {
    if !response.success {
        return Err(AppError::api_rejected(
            endpoint,
            response.error.unwrap_or_else(|| "未知错误".to_string()),
        ));
    }

    let session_id = response.session_id.ok_or_else(|| ApiError::MissingField {
        endpoint: endpoint.to_string(),
        field: "session_id",
    })?;

    Ok(Session::new(
        session_id,
        response.total_files.unwrap_or(submitted),
    ))
}
