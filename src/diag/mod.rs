//! 诊断输出
//!
//! 每个摘要输出一行：覆盖的物理地址（固定宽度十六进制）与摘要（磁盘字节序的十六进制）。
//! 详细模式额外输出每个 extent 的跟踪行和原始摘要字节的 hex+ASCII 转储。
//! 详细开关在构造时传入，输出内容不影响返回的数据。

mod hexdump;

pub use hexdump::hexdump;

use crate::{csum::DigestSequence, extent::ExtentRecord, fs::FileTarget};
use core::fmt::{self, Write};

/// 诊断输出器
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    /// 创建
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 是否详细模式
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// 一个摘要
    pub fn digest_line<W: Write>(&self, out: &mut W, physical: u64, digest: &[u8]) -> fmt::Result {
        writeln!(out, "{:#018x} {}", physical, hex::encode(digest))
    }

    /// 仅在详细模式输出的跟踪行
    pub fn trace<W: Write>(&self, out: &mut W, args: fmt::Arguments<'_>) -> fmt::Result {
        if self.verbose {
            out.write_str("# ")?;
            out.write_fmt(args)?;
            out.write_char('\n')?;
        }
        Ok(())
    }

    /// 目标文件
    pub fn target<W: Write>(&self, out: &mut W, path: &str, target: &FileTarget) -> fmt::Result {
        self.trace(
            out,
            format_args!(
                "{}: subvolume {} inode {} size {}",
                path,
                target.subvolume_root_id(),
                target.inode_number(),
                target.byte_size()
            ),
        )
    }

    /// 一个 extent 的所有摘要
    pub fn extent<W: Write>(
        &self,
        out: &mut W,
        index: usize,
        record: &ExtentRecord,
        digests: &DigestSequence,
    ) -> fmt::Result {
        self.trace(
            out,
            format_args!(
                "extent {}: logical {} physical {:#x} length {} ({} digests)",
                index,
                record.logical_offset,
                record.physical_offset,
                record.length,
                digests.len()
            ),
        )?;
        if self.verbose {
            hexdump(out, 0, digests.as_bytes())?;
        }
        for (physical, digest) in digests.iter() {
            self.digest_line(out, physical, digest)?;
        }
        Ok(())
    }

    /// 校验失败的扇区
    pub fn mismatch<W: Write>(
        &self,
        out: &mut W,
        physical: u64,
        stored: &[u8],
        computed: &[u8],
    ) -> fmt::Result {
        writeln!(
            out,
            "{:#018x} MISMATCH stored={} computed={}",
            physical,
            hex::encode(stored),
            hex::encode(computed)
        )
    }
}
