//! YAML Frontmatter 解析模块
//!
//! 将笔记文件拆分为 YAML 元数据块与正文
//!
//! ## Frontmatter 格式
//!
//! ```yaml
//! ---
//! id: ab12
//! title: 自由意志
//! created-at: 2024-03-01T09:30:00Z
//! tags: [哲学, type:flashcard]
//! type: concept
//! srs:
//!   easiness: 2.5
//!   consecutive_correct: 1
//!   due: 1709372000
//!   total_reviews: 1
//! ---
//! ```
//!
//! 首行不是 `---`，或找不到闭合的 `---`，都视为没有 frontmatter（不是错误）。
//! 元数据块本身不是合法映射时才返回 `Error::Parse`。

use crate::core::srs::{ReviewRecord, SrsData, DEFAULT_EASINESS};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use yaml_rust2::yaml::Hash;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

/// frontmatter 分隔行
pub const DELIMITER: &str = "---";

const KEY_ID: &str = "id";
const KEY_TITLE: &str = "title";
const KEY_CREATED: &str = "created-at";
const KEY_TAGS: &str = "tags";
const KEY_TYPE: &str = "type";
const KEY_SRS: &str = "srs";

/// Frontmatter 结构
///
/// 已知字段映射为强类型，其余键原样保存在 `extra` 中并在写回时保持顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub id: Option<String>,
    pub title: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// 标签列表（保持插入顺序，已去重）
    pub tags: Vec<String>,
    /// 自由格式的类型字段，缺失时为 `None`
    pub note_type: Option<String>,
    pub srs: Option<SrsData>,
    /// 未识别的键值对
    pub extra: Hash,
}

impl Frontmatter {
    /// 创建新的 Frontmatter
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 YAML 文本解析
    ///
    /// # Arguments
    ///
    /// * `yaml` - 两个分隔行之间的 YAML 文本
    ///
    /// # Returns
    ///
    /// 语法错误或顶层不是映射时返回 `Error::Parse`；字段类型不符时返回 `Error::Validation`
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let docs = YamlLoader::load_from_str(yaml)
            .map_err(|e| Error::parse(format!("invalid frontmatter: {}", e)))?;

        let hash = match docs.into_iter().next() {
            None | Some(Yaml::Null) => return Ok(Self::new()),
            Some(Yaml::Hash(hash)) => hash,
            Some(_) => return Err(Error::parse("frontmatter must be a key-value mapping")),
        };

        let mut frontmatter = Self::new();
        for (k, value) in hash {
            let name = k.as_str().map(str::to_owned);
            match name.as_deref() {
                Some(KEY_ID) => frontmatter.id = optional_string(KEY_ID, &value)?,
                Some(KEY_TITLE) => frontmatter.title = optional_string(KEY_TITLE, &value)?,
                Some(KEY_CREATED) => {
                    frontmatter.created = match optional_string(KEY_CREATED, &value)? {
                        Some(raw) => Some(parse_timestamp(&raw)?),
                        None => None,
                    }
                }
                Some(KEY_TAGS) => frontmatter.tags = parse_tags(&value)?,
                Some(KEY_TYPE) => frontmatter.note_type = optional_string(KEY_TYPE, &value)?,
                Some(KEY_SRS) => frontmatter.srs = parse_srs(&value)?,
                _ => {
                    frontmatter.extra.insert(k, value);
                }
            }
        }

        Ok(frontmatter)
    }

    /// 转换为 YAML 字符串（不含分隔行）
    ///
    /// 空的可选字段会被省略
    pub fn to_yaml(&self) -> Result<String> {
        let mut hash = Hash::new();

        if let Some(id) = &self.id {
            hash.insert(key(KEY_ID), Yaml::String(id.clone()));
        }
        if let Some(title) = &self.title {
            hash.insert(key(KEY_TITLE), Yaml::String(title.clone()));
        }
        if let Some(created) = &self.created {
            hash.insert(key(KEY_CREATED), Yaml::String(format_timestamp(created)));
        }
        if !self.tags.is_empty() {
            let tags = self.tags.iter().cloned().map(Yaml::String).collect();
            hash.insert(key(KEY_TAGS), Yaml::Array(tags));
        }
        if let Some(note_type) = self.note_type.as_ref().filter(|t| !t.is_empty()) {
            hash.insert(key(KEY_TYPE), Yaml::String(note_type.clone()));
        }
        if let Some(srs) = &self.srs {
            hash.insert(key(KEY_SRS), srs_to_yaml(srs));
        }
        for (k, v) in &self.extra {
            if !hash.contains_key(k) {
                hash.insert(k.clone(), v.clone());
            }
        }

        let mut out = String::new();
        YamlEmitter::new(&mut out)
            .dump(&Yaml::Hash(hash))
            .map_err(|e| Error::parse(format!("failed to emit frontmatter: {:?}", e)))?;

        let body = out
            .strip_prefix("---\n")
            .or_else(|| out.strip_prefix(DELIMITER))
            .unwrap_or(&out);
        Ok(body.trim_start_matches(' ').to_string())
    }
}

/// 检查内容是否以 frontmatter 开头（且有闭合分隔行）
pub fn has_frontmatter(content: &str) -> bool {
    split_frontmatter(content).0.is_some()
}

/// 拆分 frontmatter 与正文
///
/// # Returns
///
/// (frontmatter_yaml, body)；没有完整的 frontmatter 时返回 `(None, content)`
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut lines = content.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) if is_delimiter(line) => line,
        _ => return (None, content),
    };

    let mut offset = first.len();
    for line in lines {
        if is_delimiter(line) {
            let yaml = &content[first.len()..offset];
            let body = &content[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, content)
}

/// 解析 frontmatter 并返回正文
pub fn parse_frontmatter(content: &str) -> Result<(Frontmatter, &str)> {
    match split_frontmatter(content) {
        (Some(yaml), body) => Ok((Frontmatter::from_yaml(yaml)?, body)),
        (None, body) => Ok((Frontmatter::new(), body)),
    }
}

/// 解析时间戳
///
/// 支持 RFC3339、`YYYY-MM-DD HH:MM:SS`、`YYYY-MM-DDTHH:MM:SS` 与 `YYYY-MM-DD`，
/// 无时区的值按 UTC 处理
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(Error::validation(format!("invalid timestamp {:?}", raw)))
}

/// 格式化为 RFC3339（UTC，保留亚秒精度）
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

fn key(name: &str) -> Yaml {
    Yaml::String(name.to_string())
}

/// 标量转字符串；`null` 视为缺失
fn optional_string(field: &str, value: &Yaml) -> Result<Option<String>> {
    match value {
        Yaml::Null => Ok(None),
        Yaml::String(s) => Ok(Some(s.clone())),
        Yaml::Integer(i) => Ok(Some(i.to_string())),
        Yaml::Real(r) => Ok(Some(r.clone())),
        Yaml::Boolean(b) => Ok(Some(b.to_string())),
        _ => Err(Error::validation(format!("field `{}` must be a scalar", field))),
    }
}

fn parse_tags(value: &Yaml) -> Result<Vec<String>> {
    let raw: Vec<String> = match value {
        Yaml::Null => Vec::new(),
        Yaml::Array(items) => items
            .iter()
            .map(|item| {
                optional_string(KEY_TAGS, item)?
                    .ok_or_else(|| Error::validation("field `tags` must not contain null"))
            })
            .collect::<Result<_>>()?,
        scalar => optional_string(KEY_TAGS, scalar)?.into_iter().collect(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn parse_srs(value: &Yaml) -> Result<Option<SrsData>> {
    let hash = match value {
        Yaml::Null => return Ok(None),
        Yaml::Hash(hash) => hash,
        _ => return Err(Error::validation("field `srs` must be a mapping")),
    };

    let field = |name: &str| hash.get(&key(name)).filter(|v| !v.is_null());

    let easiness = match field("easiness") {
        Some(v) => v
            .as_f64()
            .or_else(|| v.as_i64().map(|i| i as f64))
            .ok_or_else(|| Error::validation("srs.easiness must be a number"))?,
        None => DEFAULT_EASINESS,
    };
    let consecutive_correct = count(field("consecutive_correct"), "srs.consecutive_correct")?;
    let total_reviews = count(field("total_reviews"), "srs.total_reviews")?;
    let due = match field("due") {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| Error::validation("srs.due must be an integer timestamp"))?,
        None => 0,
    };

    let review_history = match field("review_history") {
        None => Vec::new(),
        Some(Yaml::Array(items)) => items
            .iter()
            .map(parse_review_record)
            .collect::<Result<_>>()?,
        Some(_) => return Err(Error::validation("srs.review_history must be a list")),
    };

    let data = SrsData {
        easiness,
        consecutive_correct,
        due,
        total_reviews,
        review_history,
    };
    data.validate()?;
    Ok(Some(data))
}

fn parse_review_record(item: &Yaml) -> Result<ReviewRecord> {
    let hash = item
        .as_hash()
        .ok_or_else(|| Error::validation("review_history entries must be mappings"))?;

    let timestamp = hash
        .get(&key("timestamp"))
        .and_then(Yaml::as_i64)
        .ok_or_else(|| Error::validation("review_history.timestamp must be an integer"))?;
    let quality = hash
        .get(&key("quality"))
        .and_then(Yaml::as_i64)
        .ok_or_else(|| Error::validation("review_history.quality must be an integer"))?;
    let quality = u8::try_from(quality)
        .map_err(|_| Error::validation(format!("review quality {} is out of range", quality)))?;

    Ok(ReviewRecord { timestamp, quality })
}

fn count(value: Option<&Yaml>, field: &str) -> Result<u32> {
    match value {
        None => Ok(0),
        Some(v) => {
            let n = v
                .as_i64()
                .ok_or_else(|| Error::validation(format!("{} must be an integer", field)))?;
            u32::try_from(n)
                .map_err(|_| Error::validation(format!("{} must be non-negative, got {}", field, n)))
        }
    }
}

fn srs_to_yaml(srs: &SrsData) -> Yaml {
    let mut hash = Hash::new();
    hash.insert(key("easiness"), Yaml::Real(format_float(srs.easiness)));
    hash.insert(
        key("consecutive_correct"),
        Yaml::Integer(i64::from(srs.consecutive_correct)),
    );
    hash.insert(key("due"), Yaml::Integer(srs.due));
    hash.insert(key("total_reviews"), Yaml::Integer(i64::from(srs.total_reviews)));

    if !srs.review_history.is_empty() {
        let records = srs
            .review_history
            .iter()
            .map(|r| {
                let mut entry = Hash::new();
                entry.insert(key("timestamp"), Yaml::Integer(r.timestamp));
                entry.insert(key("quality"), Yaml::Integer(i64::from(r.quality)));
                Yaml::Hash(entry)
            })
            .collect();
        hash.insert(key("review_history"), Yaml::Array(records));
    }

    Yaml::Hash(hash)
}

/// 保证浮点数写出后仍被识别为浮点数（`3` -> `3.0`）
fn format_float(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}
