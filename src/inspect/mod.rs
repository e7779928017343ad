//! 校验和恢复流水线
//!
//! 路径解析 → 最小文件大小检查 → 子卷根 → extent 枚举 → 校验和关联，
//! 可选地再读取数据重新计算摘要进行比对。

mod dump;
mod verify;

pub use dump::{dump_csums, dump_file, CsumDump, ExtentDigests};
pub use verify::{verify_extent, Mismatch, VerifyReport};
