//! 文件 extent 枚举模块
//!
//! 沿子卷树中一个 inode 的 EXTENT_DATA 记录，惰性地产生
//! `(逻辑偏移, 物理偏移, 长度)` 序列。
//!
//! ## 主要功能
//!
//! - [`ExtentEnumerator`] - 前向、有限、惰性的 extent 序列（`Iterator`）
//! - [`ExtentRecord`] - 一段带校验和的物理范围
//!
//! 内联 extent、空洞和预分配 extent 没有数据校验和，枚举时跳过。

mod enumerator;

pub use enumerator::{ExtentEnumerator, ExtentRecord};
