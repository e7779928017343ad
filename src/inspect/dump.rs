//! 恢复一个文件的全部数据校验和

use crate::{
    block::BlockDevice,
    consts::*,
    crypto::CryptoProvider,
    csum::{ChecksumCorrelator, CorrelatorStats, DigestSequence},
    dir::{PathResolver, TreePathResolver},
    error::{Error, ErrorKind, Result},
    extent::{ExtentEnumerator, ExtentRecord},
    fs::{read_root, BtrfsFs, FileTarget, FsLayout},
    tree::{NodeSource, TreeReader},
};
use alloc::vec::Vec;

/// 一个 extent 及其摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentDigests {
    /// extent
    pub record: ExtentRecord,
    /// 摘要（`record.length / sector_size` 个）
    pub digests: DigestSequence,
}

/// 一个文件的校验和恢复结果
#[derive(Debug, Clone)]
pub struct CsumDump {
    target: FileTarget,
    extents: Vec<ExtentDigests>,
    stats: CorrelatorStats,
}

impl CsumDump {
    /// 目标文件
    pub fn target(&self) -> &FileTarget {
        &self.target
    }

    /// 按逻辑偏移排列的 extent
    pub fn extents(&self) -> &[ExtentDigests] {
        &self.extents
    }

    /// 摘要总数
    pub fn digest_count(&self) -> usize {
        self.extents.iter().map(|e| e.digests.len()).sum()
    }

    /// extent 覆盖的总字节数
    pub fn extent_bytes(&self) -> u64 {
        self.extents.iter().map(|e| e.record.length).sum()
    }

    /// 关联统计
    pub fn stats(&self) -> CorrelatorStats {
        self.stats
    }
}

/// 恢复 `path` 的所有数据校验和
///
/// # 参数
///
/// * `reader` - 树读取器
/// * `layout` - superblock 参数
/// * `resolver` - 路径解析器
/// * `path` - 文件系统内的路径
///
/// # 错误
///
/// - `ErrorKind::InvalidInput` - 文件小于 1 KiB（在访问 extent / 校验和索引之前）
/// - `ErrorKind::NotFound` - 路径不存在、inode 没有 extent、没有覆盖的校验和条目
/// - `ErrorKind::SubvolumeUnreadable` - 子卷根无法读取
/// - `ErrorKind::InvalidData` - 索引中出现异常记录
/// - `ErrorKind::Incomplete` - 校验和索引在凑齐之前中断
pub fn dump_csums<S: NodeSource, R: PathResolver>(
    reader: &TreeReader<S>,
    layout: &FsLayout,
    resolver: &R,
    path: &str,
) -> Result<CsumDump> {
    let target = resolver.resolve(path)?;
    if target.byte_size() < BTRFS_MIN_DUMP_FILE_SIZE {
        log::error!(
            "[DUMP] {:?} is {} bytes, smaller than {} bytes",
            path,
            target.byte_size(),
            BTRFS_MIN_DUMP_FILE_SIZE
        );
        return Err(Error::new(ErrorKind::InvalidInput, "file smaller than 1KiB"));
    }

    let subvol = target.subvolume_root_id();
    if subvol != layout.default_subvol {
        log::debug!("[DUMP] {:?} lives in subvolume {}, not the default", path, subvol);
    }
    let root = read_root(reader, layout.root_tree, subvol).map_err(|e| {
        log::error!("[DUMP] cannot read root of subvolume {}: {}", subvol, e);
        e.recategorize(ErrorKind::SubvolumeUnreadable)
    })?;

    let sector = layout.sector_size as u64;
    let mut correlator = ChecksumCorrelator::new(reader, layout.csum_root, layout.sector_size, layout.csum_size);
    let mut extents = Vec::new();

    for record in ExtentEnumerator::new(reader, root.root, target.inode_number()) {
        let record = record?;
        let digests = correlator.correlate(record.physical_offset, record.length)?;
        if digests.len() as u64 * sector != record.length {
            log::error!(
                "[DUMP] extent {:?}: got {} digests, expected {}",
                record,
                digests.len(),
                record.length / sector
            );
            return Err(Error::new(ErrorKind::InvalidData, "digest count does not match extent length"));
        }
        extents.push(ExtentDigests { record, digests });
    }

    let stats = correlator.stats();
    log::info!(
        "[DUMP] {:?}: {} extents, seeks={} entries={} carried={}",
        path,
        extents.len(),
        stats.seeks,
        stats.entries_read,
        stats.carried_hits
    );
    Ok(CsumDump { target, extents, stats })
}

/// 在已打开的文件系统上恢复 `path` 的校验和
pub fn dump_file<D: BlockDevice, P: CryptoProvider>(fs: &BtrfsFs<D, P>, path: &str) -> Result<CsumDump> {
    let layout = fs.layout();
    let resolver = TreePathResolver::new(fs.reader(), layout.root_tree, layout.default_subvol);
    dump_csums(fs.reader(), &layout, &resolver, path)
}
