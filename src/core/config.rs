//! 引擎配置模块
//!
//! 管理 ID 生成、外部工具、搜索与扫描的可调参数
//!
//! ## 配置格式
//!
//! ```toml
//! [ids]
//! length = 4
//! alphabet = "abcdefghijklmnopqrstuvwxyz0123456789"
//!
//! [tool]
//! program = "zk"
//! enabled = true
//!
//! [search]
//! default_limit = 50
//!
//! [scan]
//! skip_hidden = true
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 默认 ID 字符集
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// 默认 ID 长度
pub const DEFAULT_ID_LENGTH: usize = 4;

/// 引擎配置
///
/// 所有字段都有默认值，配置文件中缺失的段落会自动补全
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ID 生成配置
    pub ids: IdConfig,
    /// 外部索引工具配置
    pub tool: ToolConfig,
    /// 搜索配置
    pub search: SearchConfig,
    /// 目录扫描配置
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    pub length: usize,
    pub alphabet: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
            alphabet: DEFAULT_ALPHABET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// 外部工具可执行文件名或路径
    pub program: String,
    /// 为 false 时始终走内存搜索
    pub enabled: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "zk".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 跳过以 `.` 开头的文件和目录
    pub skip_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { skip_hidden: true }
    }
}

impl EngineConfig {
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    ///
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    ///
    /// 文件不存在时返回默认配置；文件格式错误时返回 `Error::Parse`
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content).map_err(|e| e.with_path(path))
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::parse(e.to_string()))
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))?;
        crate::storage::write_atomic(path, content.as_bytes())
    }
}
