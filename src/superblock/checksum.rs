//! Superblock 校验和
//!
//! 校验和覆盖 `[0x20, 0x1000)`，结果按算法长度写在 superblock 开头。

use crate::{
    consts::{BTRFS_CSUM_SIZE, BTRFS_SUPER_INFO_SIZE},
    crypto::{Checksummer, CryptoProvider},
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;

/// 计算原始 superblock 的校验和
pub fn compute_checksum<P: CryptoProvider>(raw: &[u8], summer: &Checksummer<P>) -> Result<Vec<u8>> {
    if raw.len() < BTRFS_SUPER_INFO_SIZE {
        return Err(Error::new(ErrorKind::InvalidInput, "superblock buffer too short"));
    }
    summer.compute(&raw[BTRFS_CSUM_SIZE..BTRFS_SUPER_INFO_SIZE])
}

/// 验证 superblock 校验和
///
/// # 返回
///
/// 校验和一致返回 `Ok(())`，否则返回 `InvalidData`
pub fn verify_checksum<P: CryptoProvider>(raw: &[u8], summer: &Checksummer<P>) -> Result<()> {
    let computed = compute_checksum(raw, summer)?;
    if raw[..computed.len()] != computed[..] {
        log::error!(
            "[SB] checksum mismatch ({}): stored={} computed={}",
            summer.algorithm(),
            hex::encode(&raw[..computed.len()]),
            hex::encode(&computed)
        );
        return Err(Error::new(ErrorKind::InvalidData, "superblock checksum mismatch"));
    }
    Ok(())
}
