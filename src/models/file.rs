use std::path::{Path, PathBuf};

use crate::error::{AppResult, StorageError};

/// 唯一接受的媒体类型
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// 单个文件的大小上限 (16 MiB)
pub const MAX_FILE_SIZE_BYTES: u64 = 16 * 1024 * 1024;

/// 用户选择的原始文件（尚未校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub media_type: String,
    pub byte_size: u64,
    pub path: PathBuf,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        byte_size: u64,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            byte_size,
            path: path.into(),
        }
    }

    /// 从磁盘路径构建候选文件
    ///
    /// 媒体类型按扩展名推断，大小取自文件元数据
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(
            name,
            media_type_for_path(path),
            metadata.len(),
            path,
        ))
    }
}

/// 按扩展名推断媒体类型
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => PNG_MEDIA_TYPE,
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// 校验通过的文件
///
/// `index` 是文件在提交集合中的位置，也是服务端 `file_index` 的含义。
/// 创建后不可修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    index: usize,
    name: String,
    byte_size: u64,
    path: PathBuf,
}

impl FileDescriptor {
    pub(crate) fn new(index: usize, candidate: &CandidateFile) -> Self {
        Self {
            index,
            name: candidate.name.clone(),
            byte_size: candidate.byte_size,
            path: candidate.path.clone(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
