//! 混合搜索模块
//!
//! 根据调用场景选择搜索路径：
//!
//! - [`SearchMode::Interactive`] - 实时交互，始终使用内存集合
//! - [`SearchMode::Batch`] - 一次性或批量查询，优先委托外部工具
//!
//! 外部工具不可用或失败时记录警告并回退到内存搜索，不会向调用方返回错误。

use crate::core::collection::Collection;
use crate::core::id::validate_id;
use crate::core::indexer::normalize_target;
use crate::core::tool::{LinkDirection, ListFilter, NoteTool};
use std::path::{Path, PathBuf};

/// 搜索场景
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Interactive,
    Batch,
}

/// 搜索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// 标题子串或完整 ID
    pub text: Option<String>,
    /// 必须全部带有的标签
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// 只按文本搜索
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// 追加标签条件
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_filter(&self) -> ListFilter {
        ListFilter {
            tags: self.tags.clone(),
            match_text: self.text.clone(),
            limit: self.limit,
        }
    }
}

/// 结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    Memory,
    Tool,
}

/// 搜索结果：笔记 ID 列表及其来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub ids: Vec<String>,
    pub source: SearchSource,
}

/// 混合搜索入口
pub struct HybridSearch<'a> {
    collection: &'a Collection,
    tool: Option<Box<dyn NoteTool + 'a>>,
    default_limit: usize,
}

impl<'a> HybridSearch<'a> {
    /// 创建搜索入口
    ///
    /// # Arguments
    ///
    /// * `collection` - 已加载的集合
    /// * `tool` - 外部工具；`None` 表示只使用内存搜索
    /// * `default_limit` - 查询未指定 `limit` 时使用的上限
    pub fn new(
        collection: &'a Collection,
        tool: Option<Box<dyn NoteTool + 'a>>,
        default_limit: usize,
    ) -> Self {
        Self {
            collection,
            tool,
            default_limit,
        }
    }

    /// 只使用内存集合的搜索入口
    pub fn memory_only(collection: &'a Collection, default_limit: usize) -> Self {
        Self::new(collection, None, default_limit)
    }

    /// 搜索笔记
    pub fn search(&self, query: &SearchQuery, mode: SearchMode) -> SearchResults {
        let mut query = query.clone();
        query.limit = Some(query.limit.unwrap_or(self.default_limit));

        if let Some(tool) = self.delegate(mode) {
            match tool.list(self.collection.root(), &query.to_filter()) {
                Ok(paths) => return self.from_tool(paths, query.limit),
                Err(e) => tracing::warn!("External search failed, using in-memory index: {}", e),
            }
        }

        SearchResults {
            ids: self
                .collection
                .search(&query)
                .into_iter()
                .map(|n| n.id.clone())
                .collect(),
            source: SearchSource::Memory,
        }
    }

    /// 查询与 `id` 关联的笔记
    ///
    /// `LinkDirection::To` 为反向链接，`LinkDirection::From` 为出链
    pub fn linked(&self, id: &str, direction: LinkDirection, mode: SearchMode) -> SearchResults {
        if let Some(tool) = self.delegate(mode) {
            let path = PathBuf::from(format!("{}.md", normalize_target(id)));
            match tool.linked(self.collection.root(), &path, direction) {
                Ok(paths) => return self.from_tool(paths, None),
                Err(e) => tracing::warn!("External link query failed, using in-memory index: {}", e),
            }
        }

        let ids = match direction {
            LinkDirection::To => self.collection.backlinks(id).to_vec(),
            LinkDirection::From => self
                .collection
                .outgoing(id)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        SearchResults {
            ids: dedup(ids),
            source: SearchSource::Memory,
        }
    }

    fn delegate(&self, mode: SearchMode) -> Option<&(dyn NoteTool + 'a)> {
        match mode {
            SearchMode::Interactive => None,
            SearchMode::Batch => self.tool.as_deref(),
        }
    }

    fn from_tool(&self, paths: Vec<PathBuf>, limit: Option<usize>) -> SearchResults {
        let mut ids = dedup(paths.iter().filter_map(|p| path_to_id(p)).collect());
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        SearchResults {
            ids,
            source: SearchSource::Tool,
        }
    }
}

/// 文件路径 -> 笔记 ID（取文件名，忽略非法 ID）
fn path_to_id(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    validate_id(stem).ok()?;
    Some(stem.to_string())
}

/// 去重并保持首次出现的顺序
fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool::{FakeTool, ToolCall};
    use crate::storage::Note;
    use chrono::{TimeZone, Utc};

    fn collection() -> Collection {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut a = Note::new("aaaa", "Alpha", created);
        a.set_body("[[bbbb]] [[bbbb]]");
        let b = Note::new("bbbb", "Beta", created);
        Collection::from_notes("/notes", vec![a, b]).unwrap()
    }

    #[test]
    fn test_interactive_never_calls_tool() {
        let c = collection();
        let fake = FakeTool::new();
        let search = HybridSearch::new(&c, Some(Box::new(fake.clone())), 10);

        let results = search.search(&SearchQuery::text("alp"), SearchMode::Interactive);
        assert_eq!(results.ids, vec!["aaaa"]);
        assert_eq!(results.source, SearchSource::Memory);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_batch_uses_tool() {
        let c = collection();
        let fake = FakeTool::new();
        fake.respond(["/notes/bbbb.md", "/notes/readme.md", "bbbb.md", "Bad Name.md"]);
        let search = HybridSearch::new(&c, Some(Box::new(fake.clone())), 10);

        let results = search.search(&SearchQuery::text("beta"), SearchMode::Batch);
        assert_eq!(results.source, SearchSource::Tool);
        assert_eq!(results.ids, vec!["bbbb", "readme"]);
        assert_eq!(
            fake.calls(),
            vec![ToolCall::List(ListFilter {
                tags: vec![],
                match_text: Some("beta".to_string()),
                limit: Some(10),
            })]
        );
    }

    #[test]
    fn test_batch_falls_back_on_failure() {
        let c = collection();
        let fake = FakeTool::new();
        fake.fail("zk: command not found");
        let search = HybridSearch::new(&c, Some(Box::new(fake.clone())), 10);

        let results = search.search(&SearchQuery::text("beta"), SearchMode::Batch);
        assert_eq!(results.source, SearchSource::Memory);
        assert_eq!(results.ids, vec!["bbbb"]);
        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn test_default_limit_applied() {
        let c = collection();
        let search = HybridSearch::memory_only(&c, 1);
        let results = search.search(&SearchQuery::default(), SearchMode::Batch);
        assert_eq!(results.ids, vec!["aaaa"]);
    }

    #[test]
    fn test_linked_in_memory_dedups() {
        let c = collection();
        let search = HybridSearch::memory_only(&c, 10);
        let to = search.linked("bbbb", LinkDirection::To, SearchMode::Interactive);
        assert_eq!(to.ids, vec!["aaaa"]);
        let from = search.linked("aaaa", LinkDirection::From, SearchMode::Batch);
        assert_eq!(from.ids, vec!["bbbb"]);
        assert_eq!(from.source, SearchSource::Memory);
    }

    #[test]
    fn test_linked_delegates_with_note_path() {
        let c = collection();
        let fake = FakeTool::new();
        fake.respond(["aaaa.md"]);
        let search = HybridSearch::new(&c, Some(Box::new(fake.clone())), 10);

        let results = search.linked("bbbb", LinkDirection::To, SearchMode::Batch);
        assert_eq!(results.ids, vec!["aaaa"]);
        assert_eq!(
            fake.calls(),
            vec![ToolCall::Linked(PathBuf::from("bbbb.md"), LinkDirection::To)]
        );
    }
}
