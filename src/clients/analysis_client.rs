/// 分析服务 HTTP 客户端
///
/// 封装所有与分析服务相关的 HTTP 调用
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::clients::endpoints;
use crate::clients::event_stream::decode_event_stream;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::infrastructure::{AnalysisApi, StatusStream};
use crate::models::{
    BatchResponse, FileDescriptor, RetryResponse, SaveRequest, SaveResponse, StartResponse,
    StatusResponse, PNG_MEDIA_TYPE,
};

/// 分析服务客户端
pub struct AnalysisClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl AnalysisClient {
    /// 创建新的客户端
    ///
    /// 超时只加在单个请求上：推送通道需要一直保持打开
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_base_url(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, request_timeout: Duration) -> AppResult<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::api_request_failed(base_url.clone(), e))?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 构建上传表单，每个文件一个 `files` 字段
    async fn build_form(files: &[FileDescriptor]) -> AppResult<Form> {
        let mut form = Form::new();
        for file in files {
            let bytes = tokio::fs::read(file.path())
                .await
                .map_err(|e| ApiError::FileReadFailed {
                    path: file.path().display().to_string(),
                    source: e,
                })?;
            let part = Part::bytes(bytes)
                .file_name(file.name().to_string())
                .mime_str(PNG_MEDIA_TYPE)?;
            form = form.part("files", part);
        }
        Ok(form)
    }

    /// 上传文件并解析 JSON 响应
    async fn post_files<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        url: String,
        files: &[FileDescriptor],
    ) -> AppResult<T> {
        let form = Self::build_form(files).await?;
        debug!("上传 {} 个文件到 {}", files.len(), endpoint);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        read_json(endpoint, response).await
    }
}

/// 读取响应体并解析为 JSON
///
/// 非 2xx 响应转换为 `BadResponse`，尽量带上服务端的 `error` 字段
async fn read_json<T: DeserializeOwned + Send>(endpoint: &str, response: Response) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::api_request_failed(endpoint, e))?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body).ok().and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        });
        return Err(ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            message,
        }
        .into());
    }

    serde_json::from_str(&body).map_err(|e| {
        ApiError::JsonParseFailed {
            endpoint: endpoint.to_string(),
            source: e,
        }
        .into()
    })
}

#[async_trait]
impl AnalysisApi for AnalysisClient {
    async fn analyze_batch(&self, files: &[FileDescriptor]) -> AppResult<BatchResponse> {
        let url = endpoints::analyze_multiple_url(&self.base_url);
        self.post_files(endpoints::ANALYZE_MULTIPLE, url, files).await
    }

    async fn start_sequential(&self, files: &[FileDescriptor]) -> AppResult<StartResponse> {
        let url = endpoints::analyze_sequential_url(&self.base_url);
        self.post_files(endpoints::ANALYZE_SEQUENTIAL, url, files).await
    }

    async fn session_status(
        &self,
        session_id: &str,
        last_result_count: usize,
    ) -> AppResult<StatusResponse> {
        let url = endpoints::session_status_url(&self.base_url, session_id);
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .query(&[("last_result_count", last_result_count)])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;

        read_json(&url, response).await
    }

    async fn cleanup_session(&self, session_id: &str) -> AppResult<()> {
        let url = endpoints::session_cleanup_url(&self.base_url, session_id);
        let response = self
            .client
            .delete(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;

        if !response.status().is_success() {
            return Err(ApiError::BadResponse {
                endpoint: url,
                status: Some(response.status().as_u16()),
                message: None,
            }
            .into());
        }
        Ok(())
    }

    async fn retry_failed(&self, session_id: &str) -> AppResult<RetryResponse> {
        let url = endpoints::session_retry_url(&self.base_url, session_id);
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;

        read_json(&url, response).await
    }

    async fn start_iterator(&self, files: &[FileDescriptor]) -> AppResult<StartResponse> {
        let url = endpoints::analyze_iterator_url(&self.base_url);
        self.post_files(endpoints::ANALYZE_ITERATOR, url, files).await
    }

    async fn open_stream(&self, session_id: &str) -> AppResult<StatusStream> {
        let url = endpoints::session_stream_url(&self.base_url, session_id);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;

        if !response.status().is_success() {
            return Err(ApiError::BadResponse {
                endpoint: url,
                status: Some(response.status().as_u16()),
                message: None,
            }
            .into());
        }

        debug!("[会话 {}] 推送通道已打开", session_id);
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(AppError::from))
            .boxed();

        Ok(StatusStream::new(session_id, decode_event_stream(bytes)))
    }

    async fn save_results(&self, request: &SaveRequest) -> AppResult<SaveResponse> {
        let url = endpoints::save_results_url(&self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoints::SAVE_RESULTS, e))?;

        read_json(endpoints::SAVE_RESULTS, response).await
    }
}
