//! 外部索引工具模块
//!
//! 把 "列出笔记"、"查询关联笔记"、"打开编辑" 三种能力抽象为 [`NoteTool`]，
//! 由调用方注入具体实现：
//!
//! - [`ZkTool`] - 通过子进程调用 `zk`
//! - [`FakeTool`] - 按脚本返回结果并记录调用，供测试使用
//!
//! 任何失败（程序不存在、非零退出、输出无法解析）都表现为
//! `Error::ToolUnavailable`，由搜索层回退到内存搜索。

use crate::core::config::ToolConfig;
use crate::error::{Error, Result};
use anyhow::Context;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

/// 列表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// 必须同时带有的标签
    pub tags: Vec<String>,
    /// 全文匹配
    pub match_text: Option<String>,
    pub limit: Option<usize>,
}

/// 关联方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// 链接到给定笔记的笔记（反向链接）
    To,
    /// 给定笔记链接出去的笔记
    From,
}

/// 外部工具能力
pub trait NoteTool {
    /// 列出满足条件的笔记路径
    fn list(&self, root: &Path, filter: &ListFilter) -> Result<Vec<PathBuf>>;

    /// 列出与 `path` 相关联的笔记路径
    fn linked(&self, root: &Path, path: &Path, direction: LinkDirection) -> Result<Vec<PathBuf>>;

    /// 在编辑器中打开笔记
    fn edit(&self, root: &Path, path: &Path) -> Result<()>;
}

/// 基于 `zk` 命令行的实现
#[derive(Debug, Clone)]
pub struct ZkTool {
    program: String,
}

impl ZkTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// 根据配置创建；禁用时返回 `None`
    pub fn from_config(config: &ToolConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.program.clone()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn list_args(root: &Path, extra: Vec<OsString>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "list".into(),
            "--notebook-dir".into(),
            root.as_os_str().to_owned(),
            "--format".into(),
            "json".into(),
            "--quiet".into(),
            "--no-input".into(),
        ];
        args.extend(extra);
        args
    }

    fn run(&self, args: &[OsString]) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("tool output is not valid UTF-8")
    }

    fn run_list(&self, root: &Path, extra: Vec<OsString>) -> Result<Vec<PathBuf>> {
        let args = Self::list_args(root, extra);
        tracing::debug!("Running {} {:?}", self.program, args);
        self.run(&args)
            .and_then(|stdout| parse_list_output(&stdout))
            .map_err(|e| Error::ToolUnavailable(format!("{:#}", e)))
    }
}

impl NoteTool for ZkTool {
    fn list(&self, root: &Path, filter: &ListFilter) -> Result<Vec<PathBuf>> {
        let mut extra: Vec<OsString> = Vec::new();
        if !filter.tags.is_empty() {
            extra.push("--tag".into());
            extra.push(filter.tags.join(",").into());
        }
        if let Some(text) = &filter.match_text {
            extra.push("--match".into());
            extra.push(text.into());
        }
        if let Some(limit) = filter.limit {
            extra.push("--limit".into());
            extra.push(limit.to_string().into());
        }
        self.run_list(root, extra)
    }

    fn linked(&self, root: &Path, path: &Path, direction: LinkDirection) -> Result<Vec<PathBuf>> {
        let flag = match direction {
            LinkDirection::To => "--link-to",
            LinkDirection::From => "--linked-by",
        };
        self.run_list(root, vec![flag.into(), path.as_os_str().to_owned()])
    }

    fn edit(&self, root: &Path, path: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("edit")
            .arg("--notebook-dir")
            .arg(root)
            .arg(path)
            .status()
            .map_err(|e| Error::ToolUnavailable(format!("failed to spawn {}: {}", self.program, e)))?;
        if !status.success() {
            return Err(Error::ToolUnavailable(format!(
                "{} edit exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

/// 解析工具输出
///
/// 支持 JSON 数组（元素为字符串或带 `path`/`absPath` 字段的对象）与每行一个路径的纯文本
pub fn parse_list_output(stdout: &str) -> anyhow::Result<Vec<PathBuf>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let value: Value = serde_json::from_str(trimmed).context("invalid JSON output")?;
        let items = value.as_array().context("JSON output is not an array")?;
        return items
            .iter()
            .map(|item| json_path(item).context("JSON entry has no path"))
            .collect();
    }

    Ok(trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn json_path(item: &Value) -> Option<PathBuf> {
    match item {
        Value::String(s) => Some(PathBuf::from(s)),
        Value::Object(map) => map
            .get("path")
            .or_else(|| map.get("absPath"))
            .and_then(Value::as_str)
            .map(PathBuf::from),
        _ => None,
    }
}

/// 工具调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    List(ListFilter),
    Linked(PathBuf, LinkDirection),
    Edit(PathBuf),
}

#[derive(Debug, Default)]
struct FakeState {
    responses: VecDeque<std::result::Result<Vec<PathBuf>, String>>,
    calls: Vec<ToolCall>,
}

/// 测试替身
///
/// 按入队顺序返回预设结果；队列为空时表现为工具不可用。
/// 克隆体共享同一份状态，交给搜索层之后仍可检查调用记录。
#[derive(Debug, Clone, Default)]
pub struct FakeTool {
    state: Rc<RefCell<FakeState>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一次成功结果
    pub fn respond<I, P>(&self, paths: I) -> &Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.state.borrow_mut().responses.push_back(Ok(paths));
        self
    }

    /// 追加一次失败
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.state
            .borrow_mut()
            .responses
            .push_back(Err(message.into()));
        self
    }

    /// 已发生的调用
    pub fn calls(&self) -> Vec<ToolCall> {
        self.state.borrow().calls.clone()
    }

    fn next(&self, call: ToolCall) -> Result<Vec<PathBuf>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        match state.responses.pop_front() {
            Some(Ok(paths)) => Ok(paths),
            Some(Err(message)) => Err(Error::ToolUnavailable(message)),
            None => Err(Error::ToolUnavailable("no scripted response".to_string())),
        }
    }
}

impl NoteTool for FakeTool {
    fn list(&self, _root: &Path, filter: &ListFilter) -> Result<Vec<PathBuf>> {
        self.next(ToolCall::List(filter.clone()))
    }

    fn linked(&self, _root: &Path, path: &Path, direction: LinkDirection) -> Result<Vec<PathBuf>> {
        self.next(ToolCall::Linked(path.to_path_buf(), direction))
    }

    fn edit(&self, _root: &Path, path: &Path) -> Result<()> {
        self.next(ToolCall::Edit(path.to_path_buf())).map(|_| ())
    }
}
