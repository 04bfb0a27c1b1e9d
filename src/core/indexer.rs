//! 反向链接索引模块
//!
//! 从一组 (笔记 ID, 正文) 构建 `目标 ID -> 来源 ID 列表` 的映射
//!
//! ## 规则
//!
//! - 只统计内部 wikilink（外部 URL 形式的 wikilink 与普通 Markdown 链接不计）
//! - 来源顺序与输入顺序一致，同一来源多次链接同一目标时重复记录
//! - 目标末尾的 `.md` 会被去掉，`[[ab12.md]]` 与 `[[ab12]]` 指向同一笔记

use crate::core::parser::link::extract_links;
use std::collections::BTreeMap;

/// 反向链接索引
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinkIndex {
    map: BTreeMap<String, Vec<String>>,
}

impl BacklinkIndex {
    /// 构建索引
    ///
    /// # Arguments
    ///
    /// * `notes` - 按确定顺序给出的 (笔记 ID, 正文)
    ///
    /// # Returns
    ///
    /// 只包含至少有一个来源的目标
    pub fn build<'a, I>(notes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::default();
        for (source, body) in notes {
            for link in extract_links(body) {
                if link.is_internal_wikilink() {
                    index.insert(&link.href, source);
                }
            }
        }
        tracing::debug!("Built backlink index with {} targets", index.map.len());
        index
    }

    fn insert(&mut self, target: &str, source: &str) {
        self.map
            .entry(normalize_target(target).to_string())
            .or_default()
            .push(source.to_string());
    }

    /// 链接到 `id` 的笔记，没有时返回空切片
    pub fn get(&self, id: &str) -> &[String] {
        self.map
            .get(normalize_target(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 所有被链接的目标，按字典序
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 转为普通映射
    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.map
    }
}

/// 去掉目标末尾的 `.md`
pub fn normalize_target(target: &str) -> &str {
    target.strip_suffix(".md").unwrap_or(target)
}

/// 便捷函数：构建 `目标 -> 来源` 映射
pub fn build_backlinks<'a, I>(notes: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    BacklinkIndex::build(notes).into_map()
}
