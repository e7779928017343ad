//! 有序索引（B 树）读取
//!
//! 只读遍历：
//!
//! - [`Node`]：显式解码并校验节点，拒绝越界和乱序
//! - [`TreeReader`]：floor 查找、定位第一条记录、节点表
//! - [`IndexCursor`]：`(节点下标, 槽位)` 路径，前进时透明跨越叶子，丢弃时释放节点
//!
//! 节点来源由 [`NodeSource`] 抽象，真实文件系统和测试镜像都实现它。

mod arena;
mod cursor;
mod node;
mod reader;

pub use arena::NodeId;
pub use cursor::{IndexCursor, PathSlot};
pub use node::{Item, KeyPtr, Node, NodeBody, NodeHeader};
pub use reader::{NodeSource, TreeReader, TreeStats};
