//! 校验和关联模块
//!
//! 给定一段 extent 的物理范围，沿校验和树凑齐恰好 `length / sector_size`
//! 个摘要。一个校验和条目可以跨越多个 extent，一个 extent 也可以跨越多个条目。
//!
//! - [`ChecksumCorrelator`] - 关联器，保留上一次用到的条目，
//!   后续 extent 落在同一条目尾部时不再重新查找
//! - [`DigestSequence`] - 按物理地址升序排列的摘要序列

mod correlator;
mod digest;

pub use correlator::{ChecksumCorrelator, CorrelatorStats};
pub use digest::DigestSequence;
