//! Superblock 操作模块
//!
//! 这个模块提供 btrfs 主 superblock 的读取、解码、几何校验和校验和验证。

mod read;
pub mod checksum;

pub use read::*;
