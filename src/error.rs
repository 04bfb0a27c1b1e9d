//! 错误类型模块
//!
//! 引擎各组件共用的错误枚举
//!
//! 解析与存储错误原样返回给调用方，内部不做重试；
//! `ToolUnavailable` 由搜索层就地恢复（回退到内存搜索）。

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// frontmatter 块或配置文件格式错误
    #[error("parse error{}: {message}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },

    /// 格式正确但违反数据模型约束
    #[error("validation error: {0}")]
    Validation(String),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("note already exists: {0}")]
    Conflict(String),

    #[error("I/O error{}: {source}", display_path(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    #[error("external tool unavailable: {0}")]
    ToolUnavailable(String),
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            path: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: Some(path.as_ref().to_path_buf()),
            source,
        }
    }

    /// 为尚未携带路径的错误附加文件路径
    pub fn with_path(self, path: impl AsRef<Path>) -> Self {
        match self {
            Error::Parse { path: None, message } => Error::Parse {
                path: Some(path.as_ref().to_path_buf()),
                message,
            },
            Error::Io { path: None, source } => Error::Io {
                path: Some(path.as_ref().to_path_buf()),
                source,
            },
            Error::Validation(message) => {
                Error::Validation(format!("{}: {}", path.as_ref().display(), message))
            }
            other => other,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { path: None, source }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_path_fills_missing_path() {
        let err = Error::parse("bad yaml").with_path("notes/abcd.md");
        match err {
            Error::Parse { path, message } => {
                assert_eq!(path, Some(PathBuf::from("notes/abcd.md")));
                assert_eq!(message, "bad yaml");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::io("x.md", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let text = err.to_string();
        assert!(text.contains("x.md"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn test_with_path_keeps_not_found() {
        let err = Error::NotFound("abcd".to_string()).with_path("abcd.md");
        assert!(matches!(err, Error::NotFound(id) if id == "abcd"));
    }
}
