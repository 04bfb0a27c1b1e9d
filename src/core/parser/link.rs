//! 链接提取模块
//!
//! 基于 pulldown-cmark 的 AST 遍历，从笔记正文中提取类型化链接
//!
//! ## 支持的链接
//!
//! - 普通 Markdown 链接 `[文本](目标)`
//! - 自动链接 `<https://…>` 与裸 URL（`https://…`、`www.…`）
//! - Wiki 链接及其上行/下行变体，见 [`wiki_link`](super::wiki_link)
//!
//! 代码块、行内代码与原始 HTML 中的内容不会产生链接。
//! 每个链接都带有所在块的完整文本及其字节范围，用于上下文展示。

use super::wiki_link::{scan_wiki_links, LinkRelation, WikiLinkMatch};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;
use url::Url;

static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://|ftp://|www\.)[^\s<>]+").expect("static url pattern")
});

/// 链接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Markdown,
    WikiLink,
    AutoLink,
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkKind::Markdown => write!(f, "markdown"),
            LinkKind::WikiLink => write!(f, "wikilink"),
            LinkKind::AutoLink => write!(f, "autolink"),
        }
    }
}

/// 从正文提取出的链接
///
/// 仅是派生数据，每次加载时重新计算，不单独持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub title: String,
    pub kind: LinkKind,
    pub is_external: bool,
    pub relations: Vec<LinkRelation>,
    /// 所在块的完整文本
    pub snippet: String,
    pub snippet_start: usize,
    pub snippet_end: usize,
}

impl Link {
    pub fn has_relation(&self, relation: LinkRelation) -> bool {
        self.relations.contains(&relation)
    }

    /// 是否参与笔记图谱（非外部的 wikilink）
    pub fn is_internal_wikilink(&self) -> bool {
        self.kind == LinkKind::WikiLink && !self.is_external
    }
}

/// 标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// 提取正文中的所有链接
///
/// # Arguments
///
/// * `body` - 不含 frontmatter 的 Markdown 正文
///
/// # Returns
///
/// 按出现顺序排列的链接；没有链接时返回空列表，从不报错
pub fn extract_links(body: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut stack: Vec<BlockScan> = Vec::new();
    let mut pending: Option<PendingLink> = None;

    for (event, range) in Parser::new_ext(body, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(tag) if is_leaf_container(&tag) => {
                stack.push(BlockScan::new(range));
            }
            Event::End(tag_end) if is_leaf_container_end(&tag_end) => {
                if let Some(block) = stack.pop() {
                    let block_range = block.range.clone();
                    links.extend(block.finish(body));
                    if let Some(parent) = stack.last_mut() {
                        parent.exclude(block_range);
                    }
                }
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                pending = Some(PendingLink {
                    link_type,
                    dest: dest_url.to_string(),
                    text: String::new(),
                    range,
                });
            }
            Event::End(TagEnd::Link) => {
                if let (Some(link), Some(block)) = (pending.take(), stack.last_mut()) {
                    // `[[x]]` 内层的 `[x]` 可能被解析为引用链接，留给 wikilink 扫描
                    if !is_bracketed_reference(body, &link) {
                        block.exclude(link.range.clone());
                    }
                    block.markdown_links.push(link);
                }
            }
            Event::Text(text) => {
                if let Some(link) = pending.as_mut() {
                    link.text.push_str(&text);
                }
            }
            Event::Code(text) => {
                if let Some(link) = pending.as_mut() {
                    link.text.push_str(&text);
                }
                if let Some(block) = stack.last_mut() {
                    block.exclude(range);
                }
            }
            Event::Start(Tag::CodeBlock(_))
            | Event::Start(Tag::HtmlBlock)
            | Event::Start(Tag::Image { .. })
            | Event::InlineHtml(_)
            | Event::Html(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_) => {
                if let Some(block) = stack.last_mut() {
                    block.exclude(range);
                }
            }
            _ => {}
        }
    }

    // 嵌套块先于外层块结束，这里恢复源文本顺序
    links.sort_by_key(|(start, _)| *start);
    links.into_iter().map(|(_, link)| link).collect()
}

/// 提取正文中的标题
pub fn extract_headings(body: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for event in Parser::new_ext(body, markdown_options()) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: level as u8,
                    text: String::new(),
                });
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_string();
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }

    headings
}

/// 按 (href, title, kind) 去重，保留首次出现的顺序
pub fn dedup_links(links: &[Link]) -> Vec<Link> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter(|link| seen.insert((link.href.clone(), link.title.clone(), link.kind)))
        .cloned()
        .collect()
}

/// 是否为带协议和主机名的绝对 URL
pub fn is_external_url(target: &str) -> bool {
    Url::parse(target.trim()).is_ok_and(|url| url.has_host())
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

fn is_leaf_container(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Paragraph | Tag::Heading { .. } | Tag::Item | Tag::TableCell
    )
}

fn is_leaf_container_end(tag: &TagEnd) -> bool {
    matches!(
        tag,
        TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell
    )
}

struct PendingLink {
    link_type: LinkType,
    dest: String,
    text: String,
    range: Range<usize>,
}

/// 紧贴在 `[` 与 `]` 之间的引用式链接
fn is_bracketed_reference(body: &str, link: &PendingLink) -> bool {
    matches!(
        link.link_type,
        LinkType::Shortcut | LinkType::Collapsed | LinkType::Reference
    ) && body[..link.range.start].ends_with('[')
        && body[link.range.end..].starts_with(']')
}

/// 一个叶子块的扫描状态
struct BlockScan {
    range: Range<usize>,
    excluded: Vec<Range<usize>>,
    markdown_links: Vec<PendingLink>,
}

impl BlockScan {
    fn new(range: Range<usize>) -> Self {
        Self {
            range,
            excluded: Vec::new(),
            markdown_links: Vec::new(),
        }
    }

    fn exclude(&mut self, range: Range<usize>) {
        if range.start < range.end {
            self.excluded.push(range);
        }
    }

    fn finish(mut self, body: &str) -> Vec<(usize, Link)> {
        self.excluded.sort_by_key(|r| r.start);
        let snippet = Snippet::of(body, &self.range);

        let wiki = scan_wiki_links(body, self.range.clone(), &self.excluded);

        let mut url_excluded = self.excluded.clone();
        url_excluded.extend(wiki.iter().map(|m| m.range.clone()));

        let mut found: Vec<(usize, Link)> = Vec::new();

        for link in self.markdown_links.drain(..) {
            if wiki.iter().any(|m| contains(&m.range, &link.range)) {
                continue;
            }
            found.push((link.range.start, markdown_link(link, &snippet)));
        }

        for m in &wiki {
            found.push((m.range.start, wiki_link(m, &snippet)));
        }

        for (start, text) in bare_urls(body, &self.range, &url_excluded) {
            found.push((start, auto_link(text, &snippet)));
        }

        found
    }
}

struct Snippet {
    text: String,
    start: usize,
    end: usize,
}

impl Snippet {
    fn of(body: &str, range: &Range<usize>) -> Self {
        let text = body.get(range.clone()).unwrap_or_default().trim_end();
        Self {
            text: text.to_string(),
            start: range.start,
            end: range.start + text.len(),
        }
    }

    fn attach(
        &self,
        href: String,
        title: String,
        kind: LinkKind,
        is_external: bool,
        relations: Vec<LinkRelation>,
    ) -> Link {
        Link {
            href,
            title,
            kind,
            is_external,
            relations,
            snippet: self.text.clone(),
            snippet_start: self.start,
            snippet_end: self.end,
        }
    }
}

fn markdown_link(link: PendingLink, snippet: &Snippet) -> Link {
    match link.link_type {
        LinkType::Autolink | LinkType::Email => {
            snippet.attach(link.dest, link.text, LinkKind::AutoLink, true, Vec::new())
        }
        _ => {
            let external = is_external_url(&link.dest);
            snippet.attach(link.dest, link.text, LinkKind::Markdown, external, Vec::new())
        }
    }
}

fn wiki_link(m: &WikiLinkMatch, snippet: &Snippet) -> Link {
    snippet.attach(
        m.target.clone(),
        m.title().to_string(),
        LinkKind::WikiLink,
        is_external_url(&m.target),
        m.relations.clone(),
    )
}

fn auto_link(text: &str, snippet: &Snippet) -> Link {
    let href = if text.len() >= 4 && text[..4].eq_ignore_ascii_case("www.") {
        format!("http://{}", text)
    } else {
        text.to_string()
    };
    snippet.attach(href, text.to_string(), LinkKind::AutoLink, true, Vec::new())
}

/// 在块内查找裸 URL，按 GFM 规则去掉末尾标点
fn bare_urls<'a>(
    body: &'a str,
    range: &Range<usize>,
    excluded: &[Range<usize>],
) -> Vec<(usize, &'a str)> {
    let Some(block) = body.get(range.clone()) else {
        return Vec::new();
    };

    BARE_URL_RE
        .find_iter(block)
        .filter_map(|m| {
            let start = range.start + m.start();
            let preceded_ok = block[..m.start()]
                .chars()
                .next_back()
                .map_or(true, |c| c.is_whitespace() || "*_~(".contains(c));
            if !preceded_ok {
                return None;
            }

            let text = trim_url_tail(m.as_str());
            let end = start + text.len();
            if text.is_empty() || excluded.iter().any(|r| r.start < end && start < r.end) {
                return None;
            }
            if text.to_ascii_lowercase().ends_with("://") {
                return None;
            }
            Some((start, &body[start..end]))
        })
        .collect()
}

fn trim_url_tail(url: &str) -> &str {
    let mut url = url;
    loop {
        let trimmed = url.trim_end_matches(['?', '!', '.', ',', ':', '*', '_', '~', '\'', '"', ';']);
        let unbalanced = trimmed.matches(')').count() > trimmed.matches('(').count();
        let trimmed = if trimmed.ends_with(')') && unbalanced {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        if trimmed.len() == url.len() {
            return trimmed;
        }
        url = trimmed;
    }
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}
