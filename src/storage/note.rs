//! 笔记数据模型定义
//!
//! 引擎内唯一的笔记表示。文件文本与 `Note` 之间的转换只发生在存储边界
//! （[`Note::from_file_contents`] / [`Note::to_file_contents`]）。

use crate::core::id::validate_id;
use crate::core::parser::frontmatter::{parse_frontmatter, Frontmatter, DELIMITER};
use crate::core::parser::link::{extract_links, Link};
use crate::core::srs::{self, SrsData};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use yaml_rust2::yaml::Hash;

/// 保留标签前缀：`type:<kind>`
pub const TYPE_TAG_PREFIX: &str = "type:";

/// 笔记结构体
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// 笔记 ID，同时是文件名（不含 `.md`）
    pub id: String,

    pub title: String,

    /// 标签（有序集合，写回时保持顺序）
    pub tags: Vec<String>,

    pub created: DateTime<Utc>,

    /// 来自文件修改时间，不写入 frontmatter
    pub modified: DateTime<Utc>,

    /// frontmatter 中的自由格式 `type` 字段
    pub note_type: Option<String>,

    /// 不含 frontmatter 的 Markdown 正文
    pub body: String,

    /// 派生：正文中的出链
    pub links: Vec<Link>,

    /// 派生：链接到本笔记的笔记 ID，由集合加载时填充
    pub backlinks: Vec<String>,

    /// 存在即表示参与间隔重复
    pub srs: Option<SrsData>,

    /// frontmatter 中未识别的键值对
    pub extra: Hash,
}

impl Note {
    /// 创建新笔记
    ///
    /// # Arguments
    ///
    /// * `id` - 笔记 ID
    /// * `title` - 标题
    /// * `created` - 创建时间
    ///
    /// # Returns
    ///
    /// 正文为空、没有标签和调度数据的 `Note`
    pub fn new(id: impl Into<String>, title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tags: Vec::new(),
            created,
            modified: created,
            note_type: None,
            body: String::new(),
            links: Vec::new(),
            backlinks: Vec::new(),
            srs: None,
            extra: Hash::new(),
        }
    }

    /// 从文件内容构建笔记
    ///
    /// # Arguments
    ///
    /// * `content` - 完整文件内容
    /// * `file_stem` - 文件名（不含扩展名）；frontmatter 缺少 `id` 时使用
    /// * `modified` - 文件修改时间
    ///
    /// # Returns
    ///
    /// frontmatter 格式错误返回 `Error::Parse`，缺少必填字段或取值非法返回 `Error::Validation`
    pub fn from_file_contents(
        content: &str,
        file_stem: &str,
        modified: DateTime<Utc>,
    ) -> Result<Self> {
        let (frontmatter, body) = parse_frontmatter(content)?;

        let id = match frontmatter.id {
            Some(id) if id != file_stem => {
                return Err(Error::validation(format!(
                    "frontmatter id {:?} does not match file name {:?}",
                    id, file_stem
                )))
            }
            Some(id) => id,
            None => file_stem.to_string(),
        };
        let title = frontmatter
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::validation("missing required field `title`"))?;
        let created = frontmatter
            .created
            .ok_or_else(|| Error::validation("missing required field `created-at`"))?;

        let note = Self {
            id,
            title,
            tags: frontmatter.tags,
            created,
            modified,
            note_type: frontmatter.note_type,
            links: extract_links(body),
            body: body.to_string(),
            backlinks: Vec::new(),
            srs: frontmatter.srs,
            extra: frontmatter.extra,
        };
        note.validate()?;
        Ok(note)
    }

    /// 序列化为文件内容：`---\n<yaml>\n---\n<body>\n`
    pub fn to_file_contents(&self) -> Result<String> {
        let frontmatter = Frontmatter {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            created: Some(self.created),
            tags: self.tags.clone(),
            note_type: self.note_type.clone(),
            srs: self.srs.clone(),
            extra: self.extra.clone(),
        };
        let yaml = frontmatter.to_yaml()?;

        let mut out = String::with_capacity(yaml.len() + self.body.len() + 16);
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(yaml.trim_end_matches('\n'));
        out.push('\n');
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(self.body.trim_end_matches('\n'));
        out.push('\n');
        Ok(out)
    }

    /// 校验必填字段与调度数据
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        if self.title.trim().is_empty() {
            return Err(Error::validation("missing required field `title`"));
        }
        if let Some(srs) = &self.srs {
            srs.validate()?;
        }
        Ok(())
    }

    /// 替换正文并重新计算出链
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.links = extract_links(&self.body);
    }

    /// 添加标签
    ///
    /// 与读取 frontmatter 时一致：去掉首尾空白，忽略空标签和已存在的标签
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    /// 移除标签
    pub fn remove_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        self.tags.retain(|t| t != tag);
    }

    /// 标签匹配（忽略大小写）
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// 保留标签 `type:<kind>` 中的类型
    pub fn kind(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| {
            t.get(..TYPE_TAG_PREFIX.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(TYPE_TAG_PREFIX))
                .map(|_| &t[TYPE_TAG_PREFIX.len()..])
        })
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind().is_some_and(|k| k.eq_ignore_ascii_case(kind))
    }

    /// 是否参与间隔重复
    pub fn is_srs(&self) -> bool {
        self.srs.is_some()
    }

    /// 是否到期（没有调度数据的笔记总是到期）
    pub fn is_due(&self, now: i64) -> bool {
        srs::is_due(self.srs.as_ref(), now)
    }

    /// 非外部 wikilink 的目标
    pub fn outgoing_ids(&self) -> impl Iterator<Item = &str> {
        self.links
            .iter()
            .filter(|l| l.is_internal_wikilink())
            .map(|l| l.href.as_str())
    }
}
