//! 文件系统层
//!
//! 把块设备、superblock、chunk 映射、节点缓存组合成树读取器需要的
//! [`NodeSource`](crate::tree::NodeSource)，并提供 root tree 查找。

mod filesystem;
mod nodes;
mod roots;
mod types;

pub use filesystem::BtrfsFs;
pub use nodes::DeviceNodes;
pub use roots::{default_subvolume, read_root};
pub use types::{FileTarget, FsConfig, FsLayout};
