//! 读取数据重新计算摘要，与恢复出的摘要比对

use crate::{
    block::BlockDevice,
    crypto::CryptoProvider,
    csum::DigestSequence,
    error::Result,
    fs::BtrfsFs,
};
use alloc::vec::Vec;

/// 一个摘要不一致的扇区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 扇区地址
    pub physical: u64,
    /// 校验和树中保存的摘要
    pub stored: Vec<u8>,
    /// 重新计算的摘要
    pub computed: Vec<u8>,
}

/// 比对结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// 检查的扇区数
    pub checked: u64,
    /// 不一致的扇区
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// 是否全部一致
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// 合并另一份结果
    pub fn merge(&mut self, other: VerifyReport) {
        self.checked += other.checked;
        self.mismatches.extend(other.mismatches);
    }
}

/// 逐扇区读取 extent 数据并与 `digests` 比对
pub fn verify_extent<D: BlockDevice, P: CryptoProvider>(
    fs: &BtrfsFs<D, P>,
    digests: &DigestSequence,
) -> Result<VerifyReport> {
    let summer = fs.checksummer();
    let sector = digests.sector_size() as usize;
    let mut report = VerifyReport::default();

    for (physical, stored) in digests.iter() {
        let data = fs.read_data(physical, sector)?;
        let computed = summer.compute(&data)?;
        report.checked += 1;
        if computed != stored {
            log::warn!("[VERIFY] sector {:#x} checksum mismatch", physical);
            report.mismatches.push(Mismatch {
                physical,
                stored: stored.to_vec(),
                computed,
            });
        }
    }
    Ok(report)
}
