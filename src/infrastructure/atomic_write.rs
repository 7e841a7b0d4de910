//! 原子文件写入
//!
//! 临时文件 → fsync → rename。写入过程中任何一步失败，目标文件都保持原样。

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// 原子地写入文件内容
///
/// 临时文件创建在目标文件同一目录下，保证 rename 不跨文件系统。
pub fn write_file_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(path).map_err(|e| e.error)?;

    sync_dir(parent);
    Ok(())
}

/// rename 之后同步目录项，尽力而为
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
