//! 提交方式选择 - 业务能力层
//!
//! 三种提交方式互斥，一次提交只会使用其中一种，且中途不会切换

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// 一次请求上传全部文件，同步返回全部结果
    #[default]
    ImmediateBatch,
    /// 启动会话后按固定间隔轮询状态
    PolledSequential,
    /// 启动会话后通过服务端推送通道接收状态
    StreamedIterator,
}

impl ProcessingMode {
    /// 按开关选择提交方式
    ///
    /// 两个开关同时打开时推送模式优先
    pub fn select(use_sequential: bool, use_iterator: bool) -> Self {
        match (use_sequential, use_iterator) {
            (_, true) => ProcessingMode::StreamedIterator,
            (true, false) => ProcessingMode::PolledSequential,
            (false, false) => ProcessingMode::ImmediateBatch,
        }
    }

    /// 是否需要服务端会话
    pub fn uses_session(&self) -> bool {
        !matches!(self, ProcessingMode::ImmediateBatch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::ImmediateBatch => "batch",
            ProcessingMode::PolledSequential => "sequential",
            ProcessingMode::StreamedIterator => "iterator",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" | "immediate" | "immediate-batch" => Ok(ProcessingMode::ImmediateBatch),
            "sequential" | "polled" | "polled-sequential" => Ok(ProcessingMode::PolledSequential),
            "iterator" | "stream" | "streamed-iterator" => Ok(ProcessingMode::StreamedIterator),
            _ => Err(ConfigError::UnknownMode {
                value: s.to_string(),
            }),
        }
    }
}
