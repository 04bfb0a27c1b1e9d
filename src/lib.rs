//! 基于本地文件的 Zettelkasten 笔记引擎
//!
//! - [`core`] - 解析、链接索引、间隔重复调度、集合与搜索
//! - [`storage`] - `<id>.md` 文件的读写

pub mod core;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// 安装默认的日志订阅器
///
/// 由应用入口调用；已安装过订阅器时直接返回
pub fn init() -> anyhow::Result<()> {
    if let Err(e) = tracing_subscriber::fmt().try_init() {
        tracing::debug!("Subscriber already installed: {}", e);
    }
    Ok(())
}
