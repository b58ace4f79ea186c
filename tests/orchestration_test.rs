//! 编排流程测试：使用内存中的假服务和记录型展示层

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_submit::error::{ApiError, AppError, AppResult, SessionError, ValidationError};
use analysis_submit::infrastructure::{AnalysisApi, StatusStream};
use analysis_submit::models::{
    BatchResponse, CandidateFile, FileDescriptor, RetryResponse, SaveRequest, SaveResponse,
    StartResponse, StatusResponse, StreamMessage, MAX_FILE_SIZE_BYTES,
};
use analysis_submit::orchestrator::{
    Orchestrator, SessionContext, SubmissionOptions, SubmissionOutcome,
};
use analysis_submit::services::{
    KeyValueStore, MemoryStore, MessageLevel, Presenter, ProcessingMode, ResultMirror,
    RESULTS_STORAGE_KEY,
};
use analysis_submit::workflow::{AggregateView, SessionPhase, SlotState};
use async_trait::async_trait;
use serde_json::{json, Value};

// ========== 假服务 ==========

#[derive(Default)]
struct FakeApi {
    batch: Mutex<Option<BatchResponse>>,
    start: Mutex<Option<StartResponse>>,
    statuses: Mutex<VecDeque<AppResult<StatusResponse>>>,
    streams: Mutex<VecDeque<Vec<AppResult<StreamMessage>>>>,
    retries: Mutex<VecDeque<AppResult<RetryResponse>>>,
    calls: Mutex<Vec<String>>,
    saved: Mutex<Vec<SaveRequest>>,
}

impl FakeApi {
    fn with_session(session_id: &str, total: usize) -> Self {
        let api = Self::default();
        *api.start.lock().unwrap() = Some(StartResponse {
            success: true,
            session_id: Some(session_id.to_string()),
            total_files: Some(total),
            error: None,
        });
        api
    }

    fn push_status(&self, value: Value) {
        let status: StatusResponse = serde_json::from_value(value).unwrap();
        self.statuses.lock().unwrap().push_back(Ok(status));
    }

    fn push_status_error(&self, err: AppError) {
        self.statuses.lock().unwrap().push_back(Err(err));
    }

    fn push_stream(&self, messages: Vec<Value>) {
        let messages = messages
            .into_iter()
            .map(|m| Ok(serde_json::from_value::<StreamMessage>(m).unwrap()))
            .collect();
        self.streams.lock().unwrap().push_back(messages);
    }

    fn push_retry(&self, response: AppResult<RetryResponse>) {
        self.retries.lock().unwrap().push_back(response);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn start_response(&self) -> AppResult<StartResponse> {
        self.start
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Other("没有配置启动响应".to_string()))
    }
}

#[async_trait]
impl AnalysisApi for FakeApi {
    async fn analyze_batch(&self, files: &[FileDescriptor]) -> AppResult<BatchResponse> {
        self.record(format!("analyze_batch:{}", files.len()));
        self.batch
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Other("没有配置批量响应".to_string()))
    }

    async fn start_sequential(&self, files: &[FileDescriptor]) -> AppResult<StartResponse> {
        self.record(format!("start_sequential:{}", files.len()));
        self.start_response()
    }

    async fn session_status(
        &self,
        session_id: &str,
        last_result_count: usize,
    ) -> AppResult<StatusResponse> {
        self.record(format!("status:{}:{}", session_id, last_result_count));
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Other("没有更多状态".to_string())))
    }

    async fn cleanup_session(&self, session_id: &str) -> AppResult<()> {
        self.record(format!("cleanup:{}", session_id));
        Ok(())
    }

    async fn retry_failed(&self, session_id: &str) -> AppResult<RetryResponse> {
        self.record(format!("retry:{}", session_id));
        self.retries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Other("没有配置重试响应".to_string())))
    }

    async fn start_iterator(&self, files: &[FileDescriptor]) -> AppResult<StartResponse> {
        self.record(format!("start_iterator:{}", files.len()));
        self.start_response()
    }

    async fn open_stream(&self, session_id: &str) -> AppResult<StatusStream> {
        self.record(format!("stream:{}", session_id));
        let messages = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        Ok(StatusStream::new(session_id, futures::stream::iter(messages)))
    }

    async fn save_results(&self, request: &SaveRequest) -> AppResult<SaveResponse> {
        self.record(format!("save:{}", request.results.len()));
        self.saved.lock().unwrap().push(request.clone());
        Ok(SaveResponse {
            message: Some("保存完成".to_string()),
            error: None,
        })
    }
}

// ========== 记录型展示层 ==========

#[derive(Default)]
struct RecordingPresenter {
    messages: Mutex<Vec<(MessageLevel, String)>>,
    errors: Mutex<Vec<String>>,
    busy: Mutex<Vec<bool>>,
    retry_visible: Mutex<Vec<bool>>,
    renders: Mutex<Vec<AggregateView>>,
}

impl RecordingPresenter {
    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    fn busy(&self) -> Vec<bool> {
        self.busy.lock().unwrap().clone()
    }

    fn retry_visible(&self) -> Vec<bool> {
        self.retry_visible.lock().unwrap().clone()
    }

    fn last_retry_visible(&self) -> Option<bool> {
        self.retry_visible.lock().unwrap().last().copied()
    }

    fn has_message(&self, level: MessageLevel, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|(l, text)| *l == level && text.contains(needle))
    }
}

impl Presenter for RecordingPresenter {
    fn show_message(&self, level: MessageLevel, text: &str) {
        self.messages.lock().unwrap().push((level, text.to_string()));
    }

    fn set_busy(&self, busy: bool) {
        self.busy.lock().unwrap().push(busy);
    }

    fn render(&self, view: &AggregateView) {
        self.renders.lock().unwrap().push(view.clone());
    }

    fn show_error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }

    fn set_retry_visible(&self, visible: bool) {
        self.retry_visible.lock().unwrap().push(visible);
    }
}

// ========== 辅助函数 ==========

fn options(mode: ProcessingMode) -> SubmissionOptions {
    SubmissionOptions {
        mode,
        poll_interval: Duration::from_millis(1),
        max_file_size_bytes: MAX_FILE_SIZE_BYTES,
    }
}

fn orchestrator(
    api: &Arc<FakeApi>,
    presenter: &Arc<RecordingPresenter>,
    mode: ProcessingMode,
) -> Orchestrator {
    Orchestrator::new(api.clone(), presenter.clone(), options(mode))
}

fn png(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/png", 1024, format!("/tmp/{}", name))
}

fn pngs(count: usize) -> Vec<CandidateFile> {
    (0..count).map(|i| png(&format!("page{}.png", i + 1))).collect()
}

fn ok_result(index: usize, attempt: u32) -> Value {
    json!({
        "file_index": index,
        "filename": format!("page{}.png", index + 1),
        "failed": false,
        "attempt": attempt,
        "result": {"extracted_data": {"受注番号": format!("ORD-{:03}", index)}},
        "elapsed_seconds": 1.2
    })
}

fn failed_result(index: usize, attempt: u32) -> Value {
    json!({
        "file_index": index,
        "filename": format!("page{}.png", index + 1),
        "failed": true,
        "attempt": attempt,
        "result": {"error": "Dify API timeout"}
    })
}

fn into_session(outcome: SubmissionOutcome) -> SessionContext {
    match outcome {
        SubmissionOutcome::Session(ctx) => ctx,
        SubmissionOutcome::Batch(_) => panic!("应该是会话模式"),
    }
}

/// 三个文件：第一次轮询拿到 1，第二次拿到失败的 0 和成功的 2 并完成
async fn run_scenario_with_one_failure(
    api: &Arc<FakeApi>,
    orchestrator: &Orchestrator,
) -> SessionContext {
    api.push_status(json!({
        "processed_files": 1,
        "total_files": 3,
        "progress_percentage": 33.3,
        "current_processing": {"file_index": 0, "current_attempt": 1},
        "new_results": [ok_result(1, 1)],
        "total_results_count": 1,
        "completed": false
    }));
    api.push_status(json!({
        "processed_files": 3,
        "total_files": 3,
        "progress_percentage": 100.0,
        "new_results": [failed_result(0, 1), ok_result(2, 1)],
        "total_results_count": 3,
        "completed": true,
        "errors": [{"file_index": 0, "error": "Dify API timeout"}]
    }));

    let outcome = orchestrator.submit(&pngs(3)).await.unwrap();
    into_session(outcome)
}

// ========== 会话模式 ==========

#[tokio::test]
async fn test_sequential_failure_keeps_session_for_retry() {
    let api = Arc::new(FakeApi::with_session("s-1", 3));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let ctx = run_scenario_with_one_failure(&api, &orchestrator).await;

    let view = ctx.view();
    let indices: Vec<usize> = view.entries().iter().map(|e| e.file_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(view.entries()[0].failed);
    assert!(!view.entries()[1].failed);
    assert!(!view.entries()[2].failed);

    assert_eq!(ctx.phase(), SessionPhase::Retryable);
    assert!(ctx.is_retryable());
    assert!(!ctx.cleanup_issued());
    assert_eq!(api.count("cleanup"), 0);
    assert_eq!(presenter.last_retry_visible(), Some(true));

    // 游标随 total_results_count 前进
    assert_eq!(
        api.calls(),
        vec!["start_sequential:3", "status:s-1:0", "status:s-1:1"]
    );
    assert!(presenter.has_message(MessageLevel::Info, "处理中: 1/3 完成"));
    assert!(presenter.errors().is_empty());
    assert_eq!(presenter.busy(), vec![true, false]);
}

#[tokio::test]
async fn test_retry_completes_failed_file_and_cleans_up_once() {
    let api = Arc::new(FakeApi::with_session("s-1", 3));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let mut ctx = run_scenario_with_one_failure(&api, &orchestrator).await;

    api.push_retry(Ok(RetryResponse {
        success: true,
        message: Some("1个文件重新处理中".to_string()),
        error: None,
    }));
    // 服务端从游标 0 返回全量，包含旧一轮的失败结果
    api.push_status(json!({
        "processed_files": 3,
        "total_files": 3,
        "new_results": [failed_result(0, 1), ok_result(0, 2), ok_result(1, 1), ok_result(2, 1)],
        "total_results_count": 3,
        "completed": true
    }));

    tokio_test::assert_ok!(orchestrator.retry_failed(Some(&mut ctx)).await);

    assert_eq!(
        ctx.tracker().slot(0),
        Some(SlotState::Completed { attempt: 2 })
    );
    assert_eq!(
        ctx.tracker().slot(1),
        Some(SlotState::Completed { attempt: 1 })
    );
    assert_eq!(ctx.phase(), SessionPhase::Closed);
    assert!(ctx.cleanup_issued());
    assert_eq!(api.count("cleanup:s-1"), 1);
    assert_eq!(api.calls().last().map(String::as_str), Some("cleanup:s-1"));
    assert!(api.calls().contains(&"status:s-1:0".to_string()));

    let view = ctx.view();
    assert_eq!(view.failed_count(), 0);
    assert_eq!(view.entries()[0].attempt, 2);

    // 调用时先隐藏，成功后保持隐藏
    let visible = presenter.retry_visible();
    assert_eq!(&visible[visible.len() - 2..], &[false, false]);
    assert!(presenter.errors().is_empty());
    assert_eq!(presenter.busy().last(), Some(&false));
}

#[tokio::test]
async fn test_retry_start_failure_reshows_affordance() {
    let api = Arc::new(FakeApi::with_session("s-1", 3));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let mut ctx = run_scenario_with_one_failure(&api, &orchestrator).await;
    api.push_retry(Ok(RetryResponse {
        success: false,
        message: None,
        error: Some("session expired".to_string()),
    }));

    let result = orchestrator.retry_failed(Some(&mut ctx)).await;
    assert!(result.is_err());

    assert_eq!(presenter.errors(), vec!["session expired".to_string()]);
    let visible = presenter.retry_visible();
    assert_eq!(&visible[visible.len() - 2..], &[false, true]);

    assert!(ctx.is_retryable());
    assert_eq!(ctx.tracker().slot(0), Some(SlotState::Failed { attempt: 1 }));
    assert_eq!(api.count("cleanup"), 0);
    assert_eq!(presenter.busy().last(), Some(&false));
}

#[tokio::test]
async fn test_retry_without_session_surfaces_error() {
    let api = Arc::new(FakeApi::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let err = orchestrator.retry_failed(None).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Session(SessionError::NoActiveSession)
    ));
    assert_eq!(presenter.errors().len(), 1);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_retry_of_closed_session_is_refused() {
    let api = Arc::new(FakeApi::with_session("s-2", 1));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    api.push_status(json!({
        "processed_files": 1,
        "total_files": 1,
        "new_results": [ok_result(0, 1)],
        "total_results_count": 1,
        "completed": true
    }));
    let mut ctx = into_session(orchestrator.submit(&pngs(1)).await.unwrap());
    assert_eq!(ctx.phase(), SessionPhase::Closed);

    let err = orchestrator.retry_failed(Some(&mut ctx)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Session(SessionError::NotRetryable { .. })
    ));
    assert_eq!(api.count("retry"), 0);
    assert_eq!(api.count("cleanup"), 1);
}

#[tokio::test]
async fn test_poll_transport_error_leaves_session_untouched() {
    let api = Arc::new(FakeApi::with_session("s-3", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    api.push_status(json!({
        "processed_files": 1,
        "total_files": 2,
        "new_results": [ok_result(0, 1)],
        "total_results_count": 1,
        "completed": false
    }));
    api.push_status_error(
        ApiError::BadResponse {
            endpoint: "/api/dify/session/s-3/status".to_string(),
            status: Some(502),
            message: Some("Bad Gateway".to_string()),
        }
        .into(),
    );

    let mut ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());

    assert!(ctx.interrupted().is_some());
    assert_eq!(ctx.phase(), SessionPhase::Active);
    assert_eq!(presenter.errors(), vec!["Bad Gateway".to_string()]);
    assert_eq!(presenter.busy(), vec![true, false]);
    assert_eq!(api.count("cleanup"), 0);
    assert_eq!(api.count("retry"), 0);

    // 恢复跟踪，游标从上次的位置继续
    api.push_status(json!({
        "processed_files": 2,
        "total_files": 2,
        "new_results": [ok_result(1, 1)],
        "total_results_count": 2,
        "completed": true
    }));
    tokio_test::assert_ok!(orchestrator.resume(&mut ctx).await);

    assert!(ctx.interrupted().is_none());
    assert_eq!(ctx.phase(), SessionPhase::Closed);
    assert_eq!(api.count("cleanup:s-3"), 1);
    assert!(api.calls().contains(&"status:s-3:1".to_string()));
}

#[tokio::test]
async fn test_completion_only_from_server_flag() {
    let api = Arc::new(FakeApi::with_session("s-4", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    // 计数已满但服务端没有声明完成，继续轮询
    api.push_status(json!({
        "processed_files": 2,
        "total_files": 2,
        "new_results": [ok_result(0, 1), ok_result(1, 1)],
        "total_results_count": 2,
        "completed": false
    }));
    api.push_status(json!({
        "processed_files": 2,
        "total_files": 2,
        "new_results": [],
        "total_results_count": 2,
        "completed": true
    }));

    let ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());

    assert_eq!(api.count("status"), 2);
    assert_eq!(ctx.phase(), SessionPhase::Closed);
    assert_eq!(api.count("cleanup"), 1);
}

#[tokio::test]
async fn test_unresolved_slot_at_completion_counts_as_failed() {
    let api = Arc::new(FakeApi::with_session("s-5", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    api.push_status(json!({
        "processed_files": 2,
        "total_files": 2,
        "new_results": [ok_result(0, 1)],
        "total_results_count": 1,
        "completed": true
    }));

    let ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());

    assert_eq!(ctx.tracker().slot(1), Some(SlotState::Failed { attempt: 1 }));
    assert!(ctx.is_retryable());
    assert_eq!(ctx.last_decision().map(|d| d.failed_indices.clone()), Some(vec![1]));
    assert_eq!(api.count("cleanup"), 0);
}

// ========== 推送模式 ==========

#[tokio::test]
async fn test_iterator_stream_success() {
    let api = Arc::new(FakeApi::with_session("it-1", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![
        json!({"processed_files": 0, "total_files": 2, "current_processing": {"file_index": 0}}),
        json!({"processed_files": 1, "total_files": 2, "results": [ok_result(1, 1)]}),
        json!({"processed_files": 2, "total_files": 2, "results": [ok_result(0, 1)], "status": "completed"}),
    ]);

    let ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());

    assert_eq!(
        api.calls(),
        vec!["start_iterator:2", "stream:it-1", "cleanup:it-1"]
    );
    assert_eq!(ctx.phase(), SessionPhase::Closed);
    let indices: Vec<usize> = ctx.view().entries().iter().map(|e| e.file_index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert!(presenter.has_message(MessageLevel::Info, "处理中: 1/2 完成 (50%)"));
    assert!(presenter.errors().is_empty());
}

#[tokio::test]
async fn test_iterator_stream_error_is_terminal() {
    let api = Arc::new(FakeApi::with_session("it-2", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![
        json!({"processed_files": 1, "total_files": 2, "results": [ok_result(0, 1)]}),
        json!({"error": "Dify API timeout"}),
        json!({"processed_files": 2, "total_files": 2, "results": [ok_result(1, 1)], "status": "completed"}),
    ]);

    let ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());

    assert_eq!(ctx.interrupted().map(|m| m.contains("Dify API timeout")), Some(true));
    assert_eq!(presenter.errors(), vec!["Dify API timeout".to_string()]);
    assert_eq!(presenter.busy(), vec![true, false]);
    // 错误之后的消息不会再被消费
    assert!(ctx.tracker().result(1).is_none());
    assert!(ctx.tracker().result(0).is_some());
    assert_eq!(api.count("cleanup"), 0);
}

#[tokio::test]
async fn test_iterator_stream_ending_early_is_an_error() {
    let api = Arc::new(FakeApi::with_session("it-3", 1));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![json!({"processed_files": 0, "total_files": 1})]);

    let ctx = into_session(orchestrator.submit(&pngs(1)).await.unwrap());

    assert!(ctx.interrupted().is_some());
    assert_eq!(presenter.errors().len(), 1);
    assert_eq!(ctx.phase(), SessionPhase::Active);
}

#[tokio::test]
async fn test_iterator_retry_opens_fresh_stream() {
    let api = Arc::new(FakeApi::with_session("it-4", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![json!({
        "processed_files": 2,
        "total_files": 2,
        "results": [ok_result(0, 1), failed_result(1, 1)],
        "status": "completed"
    })]);
    let mut ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());
    assert!(ctx.is_retryable());

    api.push_retry(Ok(RetryResponse {
        success: true,
        ..Default::default()
    }));
    api.push_stream(vec![json!({
        "processed_files": 2,
        "total_files": 2,
        "results": [ok_result(1, 2)],
        "status": "completed"
    })]);

    orchestrator.retry_failed(Some(&mut ctx)).await.unwrap();

    assert_eq!(api.count("stream:it-4"), 2);
    assert_eq!(ctx.tracker().slot(1), Some(SlotState::Completed { attempt: 2 }));
    assert_eq!(api.count("cleanup:it-4"), 1);
}

#[tokio::test]
async fn test_iterator_retry_result_without_attempt_closes_session() {
    let api = Arc::new(FakeApi::with_session("it-5", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![json!({
        "processed_files": 2,
        "total_files": 2,
        "results": [ok_result(0, 1), failed_result(1, 1)],
        "status": "completed"
    })]);
    let mut ctx = into_session(orchestrator.submit(&pngs(2)).await.unwrap());
    assert!(ctx.is_retryable());

    api.push_retry(Ok(RetryResponse {
        success: true,
        ..Default::default()
    }));
    // 推送消息里的结果不带 attempt
    api.push_stream(vec![json!({
        "processed_files": 2,
        "total_files": 2,
        "results": [{
            "file_index": 1,
            "filename": "page2.png",
            "failed": false,
            "result": {"extracted_data": {"受注番号": "ORD-001"}}
        }],
        "status": "completed"
    })]);

    tokio_test::assert_ok!(orchestrator.retry_failed(Some(&mut ctx)).await);

    assert_eq!(ctx.tracker().slot(1), Some(SlotState::Completed { attempt: 2 }));
    assert_eq!(ctx.view().failed_count(), 0);
    assert_eq!(ctx.view().entries()[1].attempt, 2);
    assert_eq!(ctx.phase(), SessionPhase::Closed);
    assert_eq!(api.count("cleanup:it-5"), 1);
    assert_eq!(presenter.last_retry_visible(), Some(false));
}

#[tokio::test]
async fn test_iterator_error_with_completed_status_is_not_success() {
    let api = Arc::new(FakeApi::with_session("it-6", 1));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::StreamedIterator);

    api.push_stream(vec![json!({
        "results": [ok_result(0, 1)],
        "status": "completed",
        "error": "Dify iterator crashed"
    })]);

    let ctx = into_session(orchestrator.submit(&pngs(1)).await.unwrap());

    assert_eq!(
        ctx.interrupted().map(|m| m.contains("Dify iterator crashed")),
        Some(true)
    );
    assert_eq!(presenter.errors(), vec!["Dify iterator crashed".to_string()]);
    assert!(ctx.tracker().result(0).is_some());
    assert_eq!(ctx.phase(), SessionPhase::Active);
    assert!(ctx.last_decision().is_none());
    assert_eq!(api.count("cleanup"), 0);
    assert_eq!(presenter.busy(), vec![true, false]);
}

// ========== 一次性批量 ==========

#[tokio::test]
async fn test_batch_results_are_rendered_and_mirrored() {
    let api = Arc::new(FakeApi::default());
    *api.batch.lock().unwrap() = Some(
        serde_json::from_value(json!({
            "success": true,
            "results": [
                {"filename": "page1.png", "result": {"text": "結果:\n```json\n{\"受注番号\": \"ORD-001\"}\n```"}},
                {"filename": "page2.png", "result": {"extracted_data": [{"行": 1}, {"行": 2}]}}
            ]
        }))
        .unwrap(),
    );
    let presenter = Arc::new(RecordingPresenter::default());
    let session_store = Arc::new(MemoryStore::new());
    let durable_store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::ImmediateBatch)
        .with_mirror(ResultMirror::new(session_store.clone(), durable_store.clone()));

    let outcome = orchestrator.submit(&pngs(2)).await.unwrap();
    let view = match outcome {
        SubmissionOutcome::Batch(view) => view,
        SubmissionOutcome::Session(_) => panic!("应该是一次性批量"),
    };

    assert_eq!(api.calls(), vec!["analyze_batch:2"]);
    assert_eq!(view.len(), 2);
    assert_eq!(
        view.flat_extracted_data(),
        vec![json!({"受注番号": "ORD-001"}), json!({"行": 1}), json!({"行": 2})]
    );

    let stored = durable_store.get_item(RESULTS_STORAGE_KEY).await.unwrap().unwrap();
    let stored: Vec<Value> = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        session_store.get_item(RESULTS_STORAGE_KEY).await.unwrap(),
        durable_store.get_item(RESULTS_STORAGE_KEY).await.unwrap()
    );
    assert_eq!(presenter.renders.lock().unwrap().len(), 1);
    assert_eq!(presenter.busy(), vec![true, false]);
}

#[tokio::test]
async fn test_batch_server_error_shown_once() {
    let api = Arc::new(FakeApi::default());
    *api.batch.lock().unwrap() = Some(BatchResponse {
        success: false,
        results: Vec::new(),
        error: Some("Dify API key missing".to_string()),
    });
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::ImmediateBatch);

    let result = orchestrator.submit(&pngs(1)).await;

    assert!(result.is_err());
    assert_eq!(presenter.errors(), vec!["Dify API key missing".to_string()]);
    assert_eq!(presenter.busy(), vec![true, false]);
}

// ========== 校验 ==========

#[tokio::test]
async fn test_no_accepted_files_sends_no_request() {
    let api = Arc::new(FakeApi::with_session("never", 1));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let candidates = vec![
        CandidateFile::new("scan.jpg", "image/jpeg", 1024, "/tmp/scan.jpg"),
        CandidateFile::new("huge.png", "image/png", MAX_FILE_SIZE_BYTES + 1, "/tmp/huge.png"),
    ];
    let err = orchestrator.submit(&candidates).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ValidationError::NoAcceptedFiles { rejected: 2 })
    ));
    assert!(api.calls().is_empty());
    assert!(presenter.has_message(MessageLevel::Warning, "scan.jpg 不是PNG文件"));
    assert!(presenter.has_message(MessageLevel::Warning, "huge.png 的文件大小超过了16 MB"));
    assert_eq!(presenter.errors().len(), 1);
    assert!(presenter.busy().is_empty());
}

#[tokio::test]
async fn test_nothing_chosen_sends_no_request() {
    let api = Arc::new(FakeApi::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::ImmediateBatch);

    let err = orchestrator.submit(&[]).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ValidationError::NoFilesChosen)
    ));
    assert!(api.calls().is_empty());
    let errors = presenter.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("请选择PNG文件"));
}

#[tokio::test]
async fn test_rejected_files_do_not_shift_indices() {
    let api = Arc::new(FakeApi::with_session("s-6", 2));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    api.push_status(json!({
        "processed_files": 2,
        "total_files": 2,
        "new_results": [ok_result(1, 1), ok_result(0, 1)],
        "total_results_count": 2,
        "completed": true
    }));

    let candidates = vec![
        png("page1.png"),
        CandidateFile::new("notes.txt", "text/plain", 10, "/tmp/notes.txt"),
        png("page2.png"),
    ];
    let ctx = into_session(orchestrator.submit(&candidates).await.unwrap());

    assert_eq!(api.calls()[0], "start_sequential:2");
    assert!(presenter.has_message(MessageLevel::Info, "2个文件已选择"));
    assert_eq!(ctx.view().len(), 2);
}

// ========== 保存 ==========

#[tokio::test]
async fn test_save_results_posts_successful_records_only() {
    let api = Arc::new(FakeApi::with_session("s-7", 3));
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::PolledSequential);

    let ctx = run_scenario_with_one_failure(&api, &orchestrator).await;
    let response = orchestrator.save_results(&ctx.view()).await.unwrap();

    assert_eq!(response.message.as_deref(), Some("保存完成"));
    let saved = api.saved.lock().unwrap();
    let indices: Vec<usize> = saved[0].results.iter().map(|r| r.file_index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(saved[0].results[0].extracted_data, json!({"受注番号": "ORD-001"}));
    assert!(presenter.has_message(MessageLevel::Success, "保存完成"));
}

#[tokio::test]
async fn test_save_with_nothing_successful_is_refused() {
    let api = Arc::new(FakeApi::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let orchestrator = orchestrator(&api, &presenter, ProcessingMode::ImmediateBatch);

    let err = orchestrator
        .save_results(&AggregateView::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ValidationError::NothingToSave)
    ));
    assert_eq!(api.count("save"), 0);
}
