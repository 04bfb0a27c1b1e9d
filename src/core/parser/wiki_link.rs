//! Wiki 链接语法模块
//!
//! 在 CommonMark 行内内容上识别四种 wikilink 写法的行内规则
//!
//! ## 链接格式
//!
//! ```markdown
//! [[目标]]            # 普通链接
//! [[目标|显示文本]]   # 带显示文本
//! #[[目标]]           # 上行链接 (up)
//! [[目标]]#           # 下行链接 (down)
//! [[[目标]]]          # 旧式下行链接 (down)
//! ```
//!
//! 链接内部的 `\[`、`\]`、`\|` 等反斜杠转义会作为字面字符保留在目标或显示文本中。
//! 链接不能跨行。

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// 链接关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRelation {
    /// 指向上层笔记
    Up,
    /// 指向下层笔记
    Down,
}

impl std::fmt::Display for LinkRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkRelation::Up => write!(f, "up"),
            LinkRelation::Down => write!(f, "down"),
        }
    }
}

/// 一次 wikilink 匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLinkMatch {
    /// 整个链接语法（含 `#` 标记）在源文本中的字节范围
    pub range: Range<usize>,
    /// 去除首尾空白后的目标
    pub target: String,
    /// `|` 之后的显示文本
    pub label: Option<String>,
    pub relations: Vec<LinkRelation>,
}

impl WikiLinkMatch {
    /// 显示文本，缺省为目标本身
    pub fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }
}

/// 在 `text[range]` 中扫描 wikilink
///
/// # Arguments
///
/// * `text` - 完整源文本
/// * `range` - 需要扫描的字节范围（通常是一个叶子块）
/// * `excluded` - 不参与扫描的字节范围（行内代码、HTML、普通链接等），需按起点排序
///
/// # Returns
///
/// 按出现顺序排列的匹配结果
pub fn scan_wiki_links(
    text: &str,
    range: Range<usize>,
    excluded: &[Range<usize>],
) -> Vec<WikiLinkMatch> {
    let bytes = text.as_bytes();
    let end = range.end.min(text.len());
    let mut matches = Vec::new();
    let mut pos = range.start;
    // 上一个链接结束位置，其尾随 `#` 不再作为下一个链接的上行标记
    let mut last_end = range.start;

    while pos < end {
        if let Some(skip) = excluded.iter().find(|r| r.contains(&pos)) {
            pos = skip.end.max(pos + 1);
            continue;
        }

        if bytes[pos] == b'\\' {
            // 转义字符及其后一个字符都不可能是链接起点
            pos += 1 + char_len_at(text, pos + 1);
            continue;
        }

        if bytes[pos] != b'[' {
            pos += 1;
            continue;
        }

        let limit = excluded
            .iter()
            .filter(|r| r.start > pos)
            .map(|r| r.start)
            .min()
            .unwrap_or(end)
            .min(end);

        match parse_at(text, pos, limit) {
            Some(mut found) => {
                let hash_before = pos > range.start
                    && pos - 1 >= last_end
                    && bytes[pos - 1] == b'#'
                    && !is_escaped(bytes, pos - 1)
                    && !excluded.iter().any(|r| r.contains(&(pos - 1)));
                if hash_before {
                    found.range.start = pos - 1;
                    found.relations.insert(0, LinkRelation::Up);
                }
                pos = found.range.end;
                last_end = found.range.end;
                matches.push(found);
            }
            None => pos += 1,
        }
    }

    matches
}

/// 尝试在 `start` 处解析一个 wikilink
fn parse_at(text: &str, start: usize, limit: usize) -> Option<WikiLinkMatch> {
    let bytes = text.as_bytes();

    let mut open = 0;
    while start + open < limit && bytes[start + open] == b'[' {
        open += 1;
    }
    // 四个以上的 `[` 只有最后三个参与匹配，前面的交给后续位置处理
    if !(2..=3).contains(&open) {
        return None;
    }
    let legacy = open == 3;

    let mut target = String::new();
    let mut label: Option<String> = None;
    let mut pos = start + open;

    loop {
        if pos >= limit {
            return None;
        }
        match bytes[pos] {
            b'\n' | b'\r' => return None,
            b'\\' if pos + 1 < limit => {
                let len = char_len_at(text, pos + 1);
                let escaped = &text[pos + 1..pos + 1 + len];
                match label.as_mut() {
                    Some(l) => l.push_str(escaped),
                    None => target.push_str(escaped),
                }
                pos += 1 + len;
            }
            b'|' if label.is_none() => {
                label = Some(String::new());
                pos += 1;
            }
            b']' => {
                let close = if legacy { "]]]" } else { "]]" };
                if text[pos..limit].starts_with(close) {
                    pos += close.len();
                    break;
                }
                return None;
            }
            b'[' => return None,
            _ => {
                let len = char_len_at(text, pos);
                let chunk = &text[pos..pos + len];
                match label.as_mut() {
                    Some(l) => l.push_str(chunk),
                    None => target.push_str(chunk),
                }
                pos += len;
            }
        }
    }

    let target = target.trim().to_string();
    if target.is_empty() {
        return None;
    }
    let label = label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());

    let mut relations = Vec::new();
    if legacy {
        relations.push(LinkRelation::Down);
    } else if pos < limit && bytes[pos] == b'#' {
        relations.push(LinkRelation::Down);
        pos += 1;
    }

    Some(WikiLinkMatch {
        range: start..pos,
        target,
        label,
        relations,
    })
}

fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let mut backslashes = 0;
    let mut i = pos;
    while i > 0 && bytes[i - 1] == b'\\' {
        backslashes += 1;
        i -= 1;
    }
    backslashes % 2 == 1
}

fn char_len_at(text: &str, pos: usize) -> usize {
    text.get(pos..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8)
}
