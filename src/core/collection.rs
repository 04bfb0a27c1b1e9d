//! 笔记集合模块
//!
//! 扫描整个目录后在内存中建立索引，服务低延迟的交互式查询：
//!
//! - ID -> 笔记
//! - 小写标题（子串匹配）
//! - 小写标签 -> 笔记 ID
//! - 反向链接（每次加载时完整重建，没有增量更新）

use crate::core::indexer::{normalize_target, BacklinkIndex};
use crate::core::parser::LinkRelation;
use crate::core::search::SearchQuery;
use crate::error::{Error, Result};
use crate::storage::{Note, NoteStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// 内存中的笔记集合
#[derive(Debug, Clone)]
pub struct Collection {
    root: PathBuf,
    /// 按 ID 排序
    notes: BTreeMap<String, Note>,
    /// (小写标题, ID)
    titles: Vec<(String, String)>,
    /// 小写标签 -> ID 列表
    tags: BTreeMap<String, Vec<String>>,
    backlinks: BacklinkIndex,
}

impl Collection {
    /// 扫描存储目录并建立索引
    ///
    /// # Arguments
    ///
    /// * `store` - 笔记存储
    ///
    /// # Returns
    ///
    /// 任一笔记解析失败时整个加载失败
    pub fn load(store: &NoteStore) -> Result<Self> {
        let started = Instant::now();
        let notes = store.scan()?;
        let collection = Self::from_notes(store.root(), notes)?;
        tracing::info!(
            "Loaded collection {:?}: {} notes in {:?}",
            store.root(),
            collection.len(),
            started.elapsed()
        );
        Ok(collection)
    }

    /// 从已解析的笔记构建集合
    ///
    /// 同一 ID 出现两次（例如不同子目录中的同名文件）时返回 `Error::Conflict`
    pub fn from_notes(root: impl Into<PathBuf>, notes: Vec<Note>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for note in notes {
            let id = note.id.clone();
            if by_id.insert(id.clone(), note).is_some() {
                return Err(Error::Conflict(format!("duplicate note id {}", id)));
            }
        }

        let backlinks = BacklinkIndex::build(
            by_id
                .values()
                .map(|n: &Note| (n.id.as_str(), n.body.as_str())),
        );

        let mut titles = Vec::with_capacity(by_id.len());
        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for note in by_id.values_mut() {
            note.backlinks = backlinks.get(&note.id).to_vec();
            titles.push((note.title.to_lowercase(), note.id.clone()));
            for tag in &note.tags {
                let ids = tags.entry(tag.to_lowercase()).or_default();
                if !ids.contains(&note.id) {
                    ids.push(note.id.clone());
                }
            }
        }

        Ok(Self {
            root: root.into(),
            notes: by_id,
            titles,
            tags,
            backlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// 按 ID 获取笔记（忽略 `.md` 后缀）
    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.get(normalize_target(id))
    }

    /// 按 ID 顺序遍历所有笔记
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    /// 内存搜索
    ///
    /// 文本与 ID 完全相同或是标题的子串（忽略大小写）时命中；
    /// 标签条件要求全部满足。结果按 ID 排序，截断到 `limit`。
    pub fn search(&self, query: &SearchQuery) -> Vec<&Note> {
        let text = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let mut hits: Vec<&Note> = match &text {
            Some(text) => self
                .titles
                .iter()
                .filter(|(title, id)| id == text || title.contains(text.as_str()))
                .filter_map(|(_, id)| self.notes.get(id))
                .collect(),
            None => self.notes.values().collect(),
        };

        if !query.tags.is_empty() {
            hits.retain(|note| query.tags.iter().all(|tag| self.tagged(tag, &note.id)));
        }

        hits.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        hits
    }

    fn tagged(&self, tag: &str, id: &str) -> bool {
        self.tags
            .get(&tag.to_lowercase())
            .is_some_and(|ids| ids.iter().any(|i| i == id))
    }

    /// 带有指定标签的笔记（忽略大小写）
    pub fn with_tag(&self, tag: &str) -> Vec<&Note> {
        self.tags
            .get(&tag.to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|id| self.notes.get(id))
            .collect()
    }

    /// 带有保留标签 `type:<kind>` 的笔记
    pub fn of_kind(&self, kind: &str) -> Vec<&Note> {
        self.notes.values().filter(|n| n.is_kind(kind)).collect()
    }

    /// 到期待复习的笔记，按到期时间排序
    ///
    /// 只包含带调度数据的笔记
    pub fn due(&self, now: i64) -> Vec<&Note> {
        let mut due: Vec<&Note> = self
            .notes
            .values()
            .filter(|n| n.srs.as_ref().is_some_and(|s| s.is_due(now)))
            .collect();
        due.sort_by_key(|n| (n.srs.as_ref().map_or(i64::MIN, |s| s.due), n.id.clone()));
        due
    }

    /// 链接到 `id` 的笔记 ID
    pub fn backlinks(&self, id: &str) -> &[String] {
        self.backlinks.get(id)
    }

    /// `id` 的内部 wikilink 目标，按出现顺序
    pub fn outgoing(&self, id: &str) -> Vec<&str> {
        self.get(id)
            .map(|n| n.outgoing_ids().map(normalize_target).collect())
            .unwrap_or_default()
    }

    /// 上行链接目标（`#[[x]]`）
    pub fn uplinks(&self, id: &str) -> Vec<&str> {
        self.related(id, LinkRelation::Up)
    }

    /// 下行链接目标（`[[x]]#` 或 `[[[x]]]`）
    pub fn downlinks(&self, id: &str) -> Vec<&str> {
        self.related(id, LinkRelation::Down)
    }

    fn related(&self, id: &str, relation: LinkRelation) -> Vec<&str> {
        self.get(id)
            .map(|n| {
                n.links
                    .iter()
                    .filter(|l| l.is_internal_wikilink() && l.has_relation(relation))
                    .map(|l| normalize_target(&l.href))
                    .collect()
            })
            .unwrap_or_default()
    }
}
