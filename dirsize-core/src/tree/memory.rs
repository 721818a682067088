//! In-memory tree, for tests and for embedding programs that size
//! something other than a mounted filesystem.

use std::sync::Arc;
use std::time::Duration;

use super::{Children, Directory, File};
use crate::Result;
use crate::cancel::CancellationToken;
use crate::error::SizeError;
use crate::sizer::SizeResult;

/// In-memory directory. Cloning is cheap; children are shared.
#[derive(Debug, Clone)]
pub struct MemDir {
    name: Arc<str>,
    dirs: Arc<Vec<MemDir>>,
    files: Arc<Vec<MemFile>>,
    failure: Option<Arc<str>>,
    delay: Option<Duration>,
}

impl MemDir {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            dirs: Arc::new(Vec::new()),
            files: Arc::new(Vec::new()),
            failure: None,
            delay: None,
        }
    }

    /// Add a sub-directory
    pub fn dir(mut self, dir: MemDir) -> Self {
        Arc::make_mut(&mut self.dirs).push(dir);
        self
    }

    /// Add a file of `size` bytes
    pub fn file(self, name: &str, size: u64) -> Self {
        self.with_file(MemFile::new(name, size))
    }

    pub fn with_file(mut self, file: MemFile) -> Self {
        Arc::make_mut(&mut self.files).push(file);
        self
    }

    /// Make listing this directory fail with `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(Arc::from(message));
        self
    }

    /// Make listing this directory take `delay` (cut short by cancellation)
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sequentially computed totals, used as the reference answer
    pub fn total(&self) -> SizeResult {
        let mut result = SizeResult::default();
        for file in self.files.iter() {
            result.size += file.size;
            result.count += 1;
        }
        for dir in self.dirs.iter() {
            let sub = dir.total();
            result.size += sub.size;
            result.count += sub.count;
        }
        result
    }

    /// Number of directories in this subtree, including `self`
    pub fn dir_count(&self) -> u64 {
        1 + self.dirs.iter().map(MemDir::dir_count).sum::<u64>()
    }

    /// Build a balanced tree `depth` levels deep where every directory has
    /// `fanout` sub-directories and `files` files. File sizes vary so that
    /// lost or duplicated updates change the total.
    pub fn synthetic(depth: u32, fanout: usize, files: usize) -> Self {
        fn build(name: String, depth: u32, shape: (usize, usize), seq: &mut u64) -> MemDir {
            let (fanout, files) = shape;
            let mut dir = MemDir::new(&name);
            for i in 0..files {
                *seq += 1;
                dir = dir.file(&format!("{}/f{}", name, i), *seq % 4093 + 1);
            }
            if depth > 0 {
                for i in 0..fanout {
                    let sub = build(format!("{}/d{}", name, i), depth - 1, shape, seq);
                    dir = dir.dir(sub);
                }
            }
            dir
        }

        let mut seq = 0;
        build(String::new(), depth, (fanout, files), &mut seq)
    }

    /// True when no copy of any directory in this subtree is alive
    /// outside the tree itself
    #[cfg(test)]
    pub(crate) fn all_released(&self) -> bool {
        Arc::strong_count(&self.dirs) == 1 && self.dirs.iter().all(MemDir::all_released)
    }
}

impl Directory for MemDir {
    fn list_children(&self, ctx: &CancellationToken) -> Result<Children> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }
        if let Some(delay) = self.delay {
            ctx.sleep(delay)?;
        }
        if let Some(message) = &self.failure {
            return Err(SizeError::Collaborator(message.to_string()));
        }

        Ok(Children::new(
            self.dirs
                .iter()
                .map(|d| Box::new(d.clone()) as Box<dyn Directory>)
                .collect(),
            self.files
                .iter()
                .map(|f| Box::new(f.clone()) as Box<dyn File>)
                .collect(),
        ))
    }

    fn name(&self) -> String {
        self.name.to_string()
    }
}

/// In-memory file
#[derive(Debug, Clone)]
pub struct MemFile {
    name: Arc<str>,
    size: u64,
    failure: Option<Arc<str>>,
    delay: Option<Duration>,
}

impl MemFile {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: Arc::from(name),
            size,
            failure: None,
            delay: None,
        }
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(Arc::from(message));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl File for MemFile {
    fn size(&self, ctx: &CancellationToken) -> Result<u64> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }
        if let Some(delay) = self.delay {
            ctx.sleep(delay)?;
        }
        match &self.failure {
            Some(message) => Err(SizeError::Collaborator(message.to_string())),
            None => Ok(self.size),
        }
    }

    fn name(&self) -> String {
        self.name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        let tree = MemDir::new("root")
            .file("a", 1)
            .dir(MemDir::new("x").file("b", 2).file("c", 3))
            .dir(MemDir::new("y").dir(MemDir::new("z").file("d", 4)));

        assert_eq!(tree.total(), SizeResult { size: 10, count: 4 });
        assert_eq!(tree.dir_count(), 4);
    }

    #[test]
    fn test_list_children() {
        let tree = MemDir::new("root")
            .file("a", 1)
            .dir(MemDir::new("x"))
            .dir(MemDir::new("y"));
        let children = tree.list_children(&CancellationToken::new()).unwrap();

        assert_eq!(children.dirs.len(), 2);
        assert_eq!(children.files.len(), 1);
        assert_eq!(children.dirs[0].name(), "x");
    }

    #[test]
    fn test_failures() {
        let ctx = CancellationToken::new();
        let dir = MemDir::new("bad").failing("listing failed");
        let file = MemFile::new("bad", 10).failing("stat failed");

        assert_eq!(dir.list_children(&ctx).unwrap_err().to_string(), "listing failed");
        assert_eq!(file.size(&ctx).unwrap_err().to_string(), "stat failed");
    }

    #[test]
    fn test_cancelled_context() {
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert!(matches!(
            MemFile::new("f", 1).size(&ctx),
            Err(SizeError::Cancelled)
        ));
        assert!(matches!(
            MemDir::new("d").list_children(&ctx),
            Err(SizeError::Cancelled)
        ));
    }

    #[test]
    fn test_synthetic_shape() {
        let tree = MemDir::synthetic(3, 4, 2);
        // 1 + 4 + 16 + 64
        assert_eq!(tree.dir_count(), 85);
        assert_eq!(tree.total().count, 170);
    }
}
