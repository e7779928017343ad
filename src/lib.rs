//! btrfs_csum: btrfs 单文件数据校验和恢复
//!
//! 给定文件系统内的一个路径，重建该文件每个数据扇区在校验和树中保存的摘要，
//! 按物理地址升序输出：
//!
//! - 只读访问，不依赖内核 btrfs 驱动
//! - 支持 CRC32C、XXHASH64、SHA-256、BLAKE2b、HMAC-SHA256
//! - 可以重新读取数据扇区，与保存的摘要比对
//!
//! # 示例
//!
//! ```rust,ignore
//! use btrfs_csum::{inspect, BtrfsFs, FileDevice, FsConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let device = FileDevice::new("/dev/sdb1")?;
//!     let fs = BtrfsFs::open(device, FsConfig::default())?;
//!
//!     let dump = inspect::dump_file(&fs, "/home/user/data.bin")?;
//!     for extent in dump.extents() {
//!         for (physical, digest) in extent.digests.iter() {
//!             println!("{:#x} {:02x?}", physical, digest);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和字节级读取
//! - [`superblock`] - superblock 解码与校验
//! - [`chunk`] - 逻辑地址到物理地址的映射
//! - [`tree`] - 有序索引（B 树）遍历
//! - [`fs`] - 打开文件系统、子卷根
//! - [`dir`] - 路径解析
//! - [`extent`] - 文件 extent 枚举
//! - [`csum`] - 校验和关联
//! - [`crypto`] - 校验和算法
//! - [`inspect`] - 完整恢复流水线和数据比对
//! - [`diag`] - 文本输出

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 基础 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 磁盘数据结构
pub mod types;

/// 块设备抽象
pub mod block;

/// 树节点缓存
pub mod cache;

// ===== 元数据 =====

/// Superblock 操作
pub mod superblock;

/// Chunk 映射
pub mod chunk;

/// 校验和算法
pub mod crypto;

/// 有序索引读取
pub mod tree;

/// 文件系统打开与子卷根
pub mod fs;

/// 目录与路径解析
pub mod dir;

/// 文件 extent 枚举
pub mod extent;

/// 校验和关联
pub mod csum;

// ===== 流水线与输出 =====

/// 校验和恢复流水线
pub mod inspect;

/// 诊断输出
pub mod diag;

#[cfg(test)]
mod testutil;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice, MemDevice};
#[cfg(feature = "std")]
pub use block::FileDevice;

// Superblock
pub use superblock::{read_superblock, Superblock};

// 算法
pub use crypto::{ChecksumAlgorithm, Checksummer, CryptoProvider, DefaultProvider};

// 树
pub use tree::{IndexCursor, NodeSource, TreeReader, TreeStats};

// 文件系统
pub use fs::{BtrfsFs, FileTarget, FsConfig, FsLayout};

// 路径
pub use dir::{PathResolver, TreePathResolver};

// Extent 与校验和
pub use csum::{ChecksumCorrelator, CorrelatorStats, DigestSequence};
pub use extent::{ExtentEnumerator, ExtentRecord};

// 流水线
pub use inspect::{dump_csums, dump_file, verify_extent, CsumDump, VerifyReport};

// 输出
pub use diag::Diagnostics;
