//! 存储层模块
//!
//! 以笔记 ID 为键，在单个目录中读写 `<id>.md` 文件
//!
//! ## 模块结构
//!
//! - [`note`](note::Note) - 笔记数据模型与文件格式转换
//! - [`atomic`](atomic::write_atomic) - 临时文件 + 重命名的原子写入
//!
//! ## 错误约定
//!
//! - 读取、更新、删除不存在的笔记返回 `Error::NotFound`
//! - 创建已存在的笔记返回 `Error::Conflict`
//! - 扫描遇到第一个无法解析的文件立即失败，错误中带有文件路径

pub mod atomic;
pub mod note;

pub use atomic::{write_atomic, write_atomic_new};
pub use note::Note;

use crate::core::config::{EngineConfig, ScanConfig, DEFAULT_ID_LENGTH};
use crate::core::id::{validate_id_length, IdGenerator};
use crate::core::srs;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// 笔记文件扩展名
pub const NOTE_EXTENSION: &str = "md";

/// 笔记存储
///
/// 只持有目录路径，不缓存任何笔记内容
#[derive(Debug, Clone)]
pub struct NoteStore {
    /// 集合根目录
    root: PathBuf,
    scan: ScanConfig,
    /// 笔记 ID 长度
    id_length: usize,
}

impl NoteStore {
    /// 打开笔记目录
    ///
    /// # Arguments
    ///
    /// * `root` - 集合根目录路径
    ///
    /// # Returns
    ///
    /// 目录不存在时返回 `Error::Io`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(root, ScanConfig::default())
    }

    /// 使用指定扫描配置打开笔记目录
    pub fn with_config(root: impl Into<PathBuf>, scan: ScanConfig) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::io(
                &root,
                io::Error::new(io::ErrorKind::NotFound, "collection root is not a directory"),
            ));
        }
        Ok(Self {
            root,
            scan,
            id_length: DEFAULT_ID_LENGTH,
        })
    }

    /// 按引擎配置打开笔记目录（扫描选项与 ID 长度）
    pub fn from_config(root: impl Into<PathBuf>, config: &EngineConfig) -> Result<Self> {
        let mut store = Self::with_config(root, config.scan.clone())?;
        if config.ids.length == 0 {
            return Err(Error::validation("id length must be greater than zero"));
        }
        store.id_length = config.ids.length;
        Ok(store)
    }

    /// 获取集合根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 笔记 ID 对应的文件路径
    ///
    /// ID 只允许小写字母和数字，因此结果总在根目录之内
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id_length(id, self.id_length)?;
        Ok(self.root.join(format!("{}.{}", id, NOTE_EXTENSION)))
    }

    /// 笔记是否存在
    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).map(|p| p.is_file()).unwrap_or(false)
    }

    /// 按 ID 读取笔记
    ///
    /// # Arguments
    ///
    /// * `id` - 笔记 ID
    ///
    /// # Returns
    ///
    /// 文件不存在时返回 `Error::NotFound`
    pub fn read(&self, id: &str) -> Result<Note> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.read_file(&path)
    }

    /// 按路径读取笔记
    ///
    /// 相对路径以集合根目录为基准，绝对路径必须位于根目录之下。
    /// 根目录之后的部分必须是 `.md` 文件且不含 `..`。
    /// `modified` 取文件修改时间，而不是 frontmatter。
    pub fn read_path(&self, path: &Path) -> Result<Note> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).map_err(|_| {
                Error::validation(format!("path is outside the collection: {:?}", path))
            })?
        } else {
            path
        };
        check_note_path(relative)?;
        self.read_file(&self.root.join(relative))
    }

    /// 读取根目录下已确定的笔记文件
    fn read_file(&self, full: &Path) -> Result<Note> {
        let content = fs::read_to_string(full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(full.display().to_string()),
            _ => Error::io(full, e),
        })?;
        let modified = file_modified(full)?;
        let stem = full
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::validation(format!("invalid file name: {:?}", full)))?;
        validate_id_length(stem, self.id_length).map_err(|e| e.with_path(full))?;

        tracing::debug!("Reading note {:?}", full);
        Note::from_file_contents(&content, stem, modified).map_err(|e| e.with_path(full))
    }

    /// 创建笔记
    ///
    /// # Arguments
    ///
    /// * `note` - 要写入的笔记，`modified` 会被设为当前时间
    ///
    /// # Returns
    ///
    /// 同 ID 文件已存在时返回 `Error::Conflict`，已有文件不会被覆盖
    pub fn create(&self, note: &mut Note) -> Result<()> {
        note.validate()?;
        let path = self.path_for(&note.id)?;
        if path.exists() {
            return Err(Error::Conflict(note.id.clone()));
        }
        note.modified = Utc::now();
        let content = note.to_file_contents()?;
        write_atomic_new(&path, content.as_bytes()).map_err(|e| match e {
            Error::Io { source, .. } if source.kind() == io::ErrorKind::AlreadyExists => {
                Error::Conflict(note.id.clone())
            }
            other => other,
        })?;
        tracing::info!("Created note {}", note.id);
        Ok(())
    }

    /// 更新已有笔记
    ///
    /// # Returns
    ///
    /// 文件不存在时返回 `Error::NotFound`
    pub fn update(&self, note: &mut Note) -> Result<()> {
        note.validate()?;
        let path = self.path_for(&note.id)?;
        if !path.is_file() {
            return Err(Error::NotFound(note.id.clone()));
        }
        note.modified = Utc::now();
        let content = note.to_file_contents()?;
        write_atomic(&path, content.as_bytes())?;
        tracing::info!("Updated note {}", note.id);
        Ok(())
    }

    /// 删除笔记（直接删除文件，没有回收站）
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(id.to_string()),
            _ => Error::io(&path, e),
        })?;
        tracing::info!("Deleted note {}", id);
        Ok(())
    }

    /// 递归扫描目录中的所有笔记
    ///
    /// 按文件名排序遍历，跳过非 `.md` 文件；任一文件解析失败即中止整个扫描
    pub fn scan(&self) -> Result<Vec<Note>> {
        let skip_hidden = self.scan.skip_hidden;
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !(skip_hidden && is_hidden(e)));

        let mut notes = Vec::new();
        for entry in walker {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() || !is_note_file(entry.path()) {
                continue;
            }
            notes.push(self.read_file(entry.path())?);
        }

        tracing::info!("Scanned {} notes in {:?}", notes.len(), self.root);
        Ok(notes)
    }

    /// 对笔记应用一次复习并写回
    ///
    /// # Arguments
    ///
    /// * `id` - 笔记 ID
    /// * `quality` - 复习质量 0..=6
    /// * `now` - 当前 Unix 时间（秒）
    ///
    /// # Returns
    ///
    /// 更新后的笔记；质量越界时不修改文件
    pub fn review(&self, id: &str, quality: i64, now: i64) -> Result<Note> {
        let mut note = self.read(id)?;
        let next = srs::process_review(note.srs.as_ref(), quality, now)?;
        tracing::debug!(
            "Review {} quality={} next due={} easiness={:.3}",
            id,
            quality,
            next.due,
            next.easiness
        );
        note.srs = Some(next);
        self.update(&mut note)?;
        Ok(note)
    }

    /// 分配未占用的 ID 并创建笔记
    pub fn create_new<R: Rng>(
        &self,
        generator: &mut IdGenerator<R>,
        title: &str,
        body: &str,
        created: DateTime<Utc>,
    ) -> Result<Note> {
        let id = generator.generate_unused(|id| self.exists(id))?;
        let mut note = Note::new(id, title, created);
        note.set_body(body);
        self.create(&mut note)?;
        Ok(note)
    }
}

/// 路径必须是 `.md` 文件且不含 `..`
fn check_note_path(path: &Path) -> Result<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::validation(format!(
            "path traversal is not allowed: {:?}",
            path
        )));
    }
    if !is_note_file(path) {
        return Err(Error::validation(format!("not a markdown file: {:?}", path)));
    }
    Ok(())
}

fn is_note_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(NOTE_EXTENSION)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

fn file_modified(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf);
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
    Error::Io { path, source }
}
