//! 笔记解析模块
//!
//! 串联 frontmatter 拆分与链接提取：原始文本 -> (元数据, 正文, 链接)

pub mod frontmatter;
pub mod link;
pub mod wiki_link;

pub use frontmatter::Frontmatter;
pub use link::{Heading, Link, LinkKind};
pub use wiki_link::LinkRelation;

use crate::error::Result;

/// 解析后的文档
#[derive(Debug, Clone)]
pub struct ParsedDoc<'a> {
    pub frontmatter: Frontmatter,
    /// 不含 frontmatter 的正文
    pub body: &'a str,
    pub links: Vec<Link>,
}

/// 解析完整的笔记文件内容
///
/// frontmatter 错误会中止解析；链接提取从不失败
pub fn parse_markdown(content: &str) -> Result<ParsedDoc<'_>> {
    let (frontmatter, body) = frontmatter::parse_frontmatter(content)?;
    let links = link::extract_links(body);
    Ok(ParsedDoc {
        frontmatter,
        body,
        links,
    })
}

/// 只提取链接，忽略 frontmatter 是否合法
pub fn quick_links(content: &str) -> Vec<Link> {
    let (_, body) = frontmatter::split_frontmatter(content);
    link::extract_links(body)
}
