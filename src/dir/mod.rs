//! 目录与路径解析模块
//!
//! - `lookup` - 单个目录内按名字哈希查找、读取 inode
//! - `path_lookup` - 逐级解析路径，跨越子卷边界

mod lookup;
mod path_lookup;

pub use lookup::{lookup_name, read_inode};
pub use path_lookup::{PathResolver, TreePathResolver};
