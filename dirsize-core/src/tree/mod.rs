//! Tree node abstraction consumed by the sizer.
//!
//! A tree is made of [`Directory`] nodes, which can list their immediate
//! children, and [`File`] leaves, which can report their size. The backing
//! store is up to the implementation: [`local`] walks the real filesystem,
//! [`memory`] holds a synthetic tree in memory.

pub mod local;
pub mod memory;

pub use local::{LocalConfig, LocalDirectory, LocalFile, SizeMode};
pub use memory::{MemDir, MemFile};

use crate::Result;
use crate::cancel::CancellationToken;

pub type DirNode = Box<dyn Directory>;
pub type FileNode = Box<dyn File>;

/// Immediate children of a directory
#[derive(Default)]
pub struct Children {
    pub dirs: Vec<DirNode>,
    pub files: Vec<FileNode>,
}

impl Children {
    pub fn new(dirs: Vec<DirNode>, files: Vec<FileNode>) -> Self {
        Self { dirs, files }
    }
}

impl std::fmt::Debug for Children {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Children")
            .field("dirs", &self.dirs.len())
            .field("files", &self.files.len())
            .finish()
    }
}

/// A node that can enumerate its immediate children.
///
/// Implementations should give up early with the token's error when
/// `ctx` is cancelled during a slow listing.
pub trait Directory: Send + Sync {
    fn list_children(&self, ctx: &CancellationToken) -> Result<Children>;

    /// Display name used in log output
    fn name(&self) -> String {
        String::new()
    }
}

/// A leaf that can report its size in bytes
pub trait File: Send + Sync {
    fn size(&self, ctx: &CancellationToken) -> Result<u64>;

    fn name(&self) -> String {
        String::new()
    }
}
