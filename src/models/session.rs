use chrono::{DateTime, Local};

/// 服务端会话
///
/// 由需要多次往返的提交方式（轮询 / 推送）创建，
/// 会话 ID 对客户端是不透明的
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    session_id: String,
    total_files: usize,
    created_at: DateTime<Local>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, total_files: usize) -> Self {
        Self {
            session_id: session_id.into(),
            total_files,
            created_at: Local::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}
