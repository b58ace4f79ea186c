use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文件选择校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 本地缓存读写错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 文件选择校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 没有选择任何文件
    #[error("请选择PNG文件")]
    NoFilesChosen,
    /// 选择了文件，但全部被拒绝
    #[error("没有有效的PNG文件 (已拒绝 {rejected} 个)")]
    NoAcceptedFiles { rejected: usize },
    /// 没有可以保存的结果
    #[error("没有可以保存的分析结果")]
    NothingToSave,
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP 状态码非 2xx
    #[error("API返回错误响应 ({endpoint}): status={status:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: Option<String>,
    },
    /// 服务端返回 success=false
    #[error("服务端拒绝请求 ({endpoint}): {message}")]
    Rejected { endpoint: String, message: String },
    /// 响应缺少必需字段
    #[error("API响应缺少字段 {field} ({endpoint})")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// 推送通道报告错误或意外中断
    #[error("推送通道失败 (会话: {session_id}): {message}")]
    StreamFailed { session_id: String, message: String },
    /// 读取待上传文件失败
    #[error("读取上传文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 会话状态错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 没有活动会话
    #[error("没有可以重试的会话")]
    NoActiveSession,
    /// 重试已在进行中
    #[error("会话 {session_id} 的重试正在进行中")]
    RetryInFlight { session_id: String },
    /// 会话当前没有失败的文件
    #[error("会话 {session_id} 没有需要重试的文件")]
    NotRetryable { session_id: String },
}

/// 本地缓存读写错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 写入失败
    #[error("写入缓存失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 读取失败
    #[error("读取缓存失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("缓存序列化失败: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未知的处理模式
    #[error("未知的处理模式: '{value}' (可选: batch / sequential / iterator)")]
    UnknownMode { value: String },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: err,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: String::new(),
            source: err,
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建服务端拒绝错误
    pub fn api_rejected(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Api(ApiError::Rejected {
            endpoint: endpoint.into(),
            message: message.into(),
        })
    }

    /// 创建推送通道错误
    pub fn stream_failed(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Api(ApiError::StreamFailed {
            session_id: session_id.into(),
            message: message.into(),
        })
    }

    /// 服务端给出的错误说明（如果有）
    ///
    /// 用户可见的提示优先使用服务端的原文
    pub fn server_message(&self) -> Option<&str> {
        match self {
            AppError::Api(ApiError::Rejected { message, .. })
            | AppError::Api(ApiError::StreamFailed { message, .. }) => Some(message),
            AppError::Api(ApiError::BadResponse { message, .. }) => message.as_deref(),
            _ => None,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
