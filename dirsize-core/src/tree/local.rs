use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use serde::{Deserialize, Serialize};

use super::{Children, Directory, File};
use crate::Result;
use crate::cancel::CancellationToken;
use crate::error::SizeError;

/// How a file's size is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeMode {
    /// Length in bytes as reported by the filesystem
    Apparent,
    /// Blocks actually allocated (accounts for sparse files and block size)
    #[default]
    DiskUsage,
}

/// Options for walking the real filesystem
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Report the size of a symlink's target instead of the link itself.
    /// Symlinked directories are never descended into.
    pub follow_symlinks: bool,
    /// Stay on same filesystem (don't cross mount points)
    pub same_filesystem: bool,
    pub size_mode: SizeMode,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            same_filesystem: true,
            size_mode: SizeMode::default(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    config: LocalConfig,
    root_dev: u64,
}

/// A directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    shared: Arc<Shared>,
}

impl LocalDirectory {
    /// Open `path` as the root of a traversal
    pub fn open(path: impl Into<PathBuf>, config: LocalConfig) -> Result<Self> {
        let path = path.into();
        let path = path.canonicalize().unwrap_or(path);

        let meta = fs::metadata(&path).map_err(|e| SizeError::from_io(&path, e))?;
        if !meta.is_dir() {
            return Err(SizeError::NotADirectory(path));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                root_dev: get_device_id(&meta),
            }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Directory for LocalDirectory {
    fn list_children(&self, ctx: &CancellationToken) -> Result<Children> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }

        let read_dir = fs::read_dir(&self.path).map_err(|e| SizeError::from_io(&self.path, e))?;
        let mut children = Children::default();

        for entry in read_dir {
            if let Some(err) = ctx.error() {
                return Err(err);
            }

            let entry = entry.map_err(|e| SizeError::from_io(&self.path, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| SizeError::from_io(&path, e))?;

            if file_type.is_dir() {
                if self.shared.config.same_filesystem {
                    let meta = entry.metadata().map_err(|e| SizeError::from_io(&path, e))?;
                    if get_device_id(&meta) != self.shared.root_dev {
                        continue;
                    }
                }
                children.dirs.push(Box::new(LocalDirectory {
                    path,
                    shared: Arc::clone(&self.shared),
                }));
            } else {
                children.files.push(Box::new(LocalFile {
                    path,
                    follow_symlinks: self.shared.config.follow_symlinks && file_type.is_symlink(),
                    size_mode: self.shared.config.size_mode,
                }));
            }
        }

        Ok(children)
    }

    fn name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// A non-directory entry on the local filesystem (regular file, symlink, device, ...)
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    follow_symlinks: bool,
    size_mode: SizeMode,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>, size_mode: SizeMode) -> Self {
        Self {
            path: path.into(),
            follow_symlinks: false,
            size_mode,
        }
    }
}

impl File for LocalFile {
    fn size(&self, ctx: &CancellationToken) -> Result<u64> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }

        let metadata = if self.follow_symlinks {
            // Dangling links fall back to the link itself
            fs::metadata(&self.path).or_else(|_| fs::symlink_metadata(&self.path))
        } else {
            fs::symlink_metadata(&self.path)
        };
        let metadata = metadata.map_err(|e| SizeError::from_io(&self.path, e))?;

        Ok(match self.size_mode {
            SizeMode::Apparent => metadata.len(),
            SizeMode::DiskUsage => get_disk_usage(&metadata),
        })
    }

    fn name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// Get actual disk usage for a file (accounts for sparse files and block size)
#[cfg(unix)]
fn get_disk_usage(metadata: &Metadata) -> u64 {
    // st_blocks is in 512-byte units
    metadata.blocks() * 512
}

#[cfg(not(unix))]
fn get_disk_usage(metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Get device ID for same-filesystem checks
#[cfg(unix)]
fn get_device_id(metadata: &Metadata) -> u64 {
    metadata.dev()
}

/// Windows - not supported, every entry reports 0
#[cfg(not(unix))]
fn get_device_id(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn apparent() -> LocalConfig {
        LocalConfig {
            size_mode: SizeMode::Apparent,
            ..LocalConfig::default()
        }
    }

    #[test]
    fn test_open_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = LocalDirectory::open(temp.path().join("nope"), apparent()).unwrap_err();
        assert!(matches!(err, SizeError::PathNotFound(_)));
    }

    #[test]
    fn test_open_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "hello").unwrap();

        let err = LocalDirectory::open(&file, apparent()).unwrap_err();
        assert!(matches!(err, SizeError::NotADirectory(_)));
    }

    #[test]
    fn test_list_children() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file1.txt"), "hello").unwrap();
        fs::write(temp.path().join("file2.txt"), "world!").unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();

        let root = LocalDirectory::open(temp.path(), apparent()).unwrap();
        let ctx = CancellationToken::new();
        let children = root.list_children(&ctx).unwrap();

        assert_eq!(children.dirs.len(), 1);
        assert_eq!(children.files.len(), 2);

        let mut sizes: Vec<u64> = children
            .files
            .iter()
            .map(|f| f.size(&ctx).unwrap())
            .collect();
        sizes.sort();
        assert_eq!(sizes, vec![5, 6]);
    }

    #[test]
    fn test_list_children_cancelled() {
        let temp = TempDir::new().unwrap();
        let root = LocalDirectory::open(temp.path(), apparent()).unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert!(matches!(root.list_children(&ctx), Err(SizeError::Cancelled)));
    }

    #[test]
    fn test_file_removed_after_listing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.txt");
        fs::write(&path, "bye").unwrap();

        let file = LocalFile::new(&path, SizeMode::Apparent);
        fs::remove_file(&path).unwrap();

        let err = file.size(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, SizeError::PathNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_usage_counts_blocks() {
        use std::io::Write;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[7u8; 1000]).unwrap();
        file.sync_all().unwrap();

        let size = LocalFile::new(&path, SizeMode::DiskUsage)
            .size(&CancellationToken::new())
            .unwrap();
        assert!(size > 0);
        assert_eq!(size % 512, 0);
    }

    #[test]
    fn test_default_config_descends_same_device() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/leaf.txt"), "leaf").unwrap();

        let config = LocalConfig::default();
        assert!(config.same_filesystem);
        assert_eq!(config.size_mode, SizeMode::DiskUsage);

        let ctx = CancellationToken::new();
        let root = LocalDirectory::open(temp.path(), config).unwrap();
        let children = root.list_children(&ctx).unwrap();
        assert_eq!(children.dirs.len(), 1);

        let a = children.dirs[0].list_children(&ctx).unwrap();
        assert_eq!(a.dirs.len(), 1);
        let b = a.dirs[0].list_children(&ctx).unwrap();
        assert!(b.dirs.is_empty());
        assert_eq!(b.files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_counted_as_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target.bin");
        fs::write(&target, vec![0u8; 100]).unwrap();
        std::os::unix::fs::symlink(&target, temp.path().join("link")).unwrap();

        let follow = LocalConfig {
            follow_symlinks: true,
            ..apparent()
        };
        let root = LocalDirectory::open(temp.path(), follow).unwrap();
        let ctx = CancellationToken::new();
        let children = root.list_children(&ctx).unwrap();

        assert!(children.dirs.is_empty());
        let total: u64 = children.files.iter().map(|f| f.size(&ctx).unwrap()).sum();
        assert_eq!(total, 200);
    }
}
