//! 分析服务接口 - 基础设施层
//!
//! 编排层只依赖这个 trait，不直接接触 HTTP

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::AppResult;
use crate::models::{
    BatchResponse, FileDescriptor, RetryResponse, SaveRequest, SaveResponse, StartResponse,
    StatusResponse, StreamMessage,
};

/// 分析服务
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// 一次性上传全部文件并同步获取结果
    async fn analyze_batch(&self, files: &[FileDescriptor]) -> AppResult<BatchResponse>;

    /// 启动逐个处理会话
    async fn start_sequential(&self, files: &[FileDescriptor]) -> AppResult<StartResponse>;

    /// 查询会话状态，`last_result_count` 是客户端已知的结果数
    async fn session_status(
        &self,
        session_id: &str,
        last_result_count: usize,
    ) -> AppResult<StatusResponse>;

    /// 请求服务端清理会话
    async fn cleanup_session(&self, session_id: &str) -> AppResult<()>;

    /// 重新处理会话中失败的文件
    async fn retry_failed(&self, session_id: &str) -> AppResult<RetryResponse>;

    /// 启动推送模式会话
    async fn start_iterator(&self, files: &[FileDescriptor]) -> AppResult<StartResponse>;

    /// 打开会话的推送通道
    async fn open_stream(&self, session_id: &str) -> AppResult<StatusStream>;

    /// 保存提取结果
    async fn save_results(&self, request: &SaveRequest) -> AppResult<SaveResponse>;
}

/// 推送通道
///
/// 有限、可取消、不可重启：关闭后不会再产生任何消息
pub struct StatusStream {
    session_id: String,
    inner: Option<BoxStream<'static, AppResult<StreamMessage>>>,
}

impl StatusStream {
    pub fn new(
        session_id: impl Into<String>,
        inner: impl Stream<Item = AppResult<StreamMessage>> + Send + 'static,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            inner: Some(inner.boxed()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 下一条消息，通道结束或已关闭时返回 `None`
    pub async fn next_message(&mut self) -> Option<AppResult<StreamMessage>> {
        let inner = self.inner.as_mut()?;
        let item = inner.next().await;
        if item.is_none() {
            self.inner = None;
        }
        item
    }

    /// 关闭通道，释放底层连接
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("[会话 {}] 推送通道已关闭", self.session_id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for StatusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStream")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
