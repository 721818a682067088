pub mod cancel;
pub mod error;
pub mod sizer;
pub mod size;
pub mod tree;

pub use cancel::CancellationToken;
pub use error::{Result, SizeError};
pub use sizer::{
    SizeProgress, SizeReport, SizeResult, Sizer, SizerConfig, WorkerStats, compute_size,
};
pub use size::{Units, format_count, format_size, format_size_with};
pub use tree::{
    Children, DirNode, Directory, File, FileNode, LocalConfig, LocalDirectory, MemDir, MemFile,
    SizeMode,
};
