//! 原子写入
//!
//! 先写入目标旁边的临时文件并 `sync_all`，再 `rename` 覆盖目标。
//! 其他进程读取目标路径时，只会看到旧内容或完整的新内容。

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// 原子写入文件
///
/// # Arguments
///
/// * `path` - 目标文件路径
/// * `content` - 文件内容
///
/// # Returns
///
/// 写入或重命名失败时返回带路径的 `Error::Io`，临时文件已被清理
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    write_atomic_with(path, content, |from, to| fs::rename(from, to))
}

/// 原子创建新文件，目标已存在时不覆盖
///
/// 最后一步用硬链接代替 `rename`，目标存在时失败并返回
/// `io::ErrorKind::AlreadyExists` 的 `Error::Io`
pub fn write_atomic_new(path: &Path, content: &[u8]) -> Result<()> {
    write_atomic_with(path, content, |from, to| {
        fs::hard_link(from, to)?;
        if let Err(e) = fs::remove_file(from) {
            tracing::warn!("Failed to remove temp file {:?}: {}", from, e);
        }
        Ok(())
    })
}

/// 可替换重命名步骤的原子写入，便于模拟重命名失败
pub(crate) fn write_atomic_with<F>(path: &Path, content: &[u8], rename: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let tmp = temp_path_for(path)?;

    if let Err(e) = write_synced(&tmp, content) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(&tmp, e));
    }

    if let Err(e) = rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            tracing::warn!("Failed to remove temp file {:?}: {}", tmp, cleanup);
        }
        return Err(Error::io(path, e));
    }

    Ok(())
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// 目标同目录下的隐藏临时文件：`.<name>.<uuid>.tmp`
fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::validation(format!("invalid file path: {:?}", path)))?;
    let tmp_name = format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple());
    Ok(path.with_file_name(tmp_name))
}
