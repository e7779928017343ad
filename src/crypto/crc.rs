//! 非密码学校验和：CRC32C 与 XXH64
//!
//! 两者总是使用内置实现，不随密码学后端切换。

use crc::{Crc, CRC_32_ISCSI};

/// CRC32C（Castagnoli），内核中称为 crc32c
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// btrfs 名字哈希使用的种子（~1）
pub const BTRFS_NAME_HASH_SEED: u32 = !1u32;

/// 计算标准 CRC32C（初值 ~0，结果取反）
///
/// 与 btrfs 数据校验和一致：`~crc32c_raw(~0, data)`。
#[inline]
pub fn crc32c(data: &[u8]) -> u32 {
    CRC32C.checksum(data)
}

/// 计算内核风格的原始 CRC32C（给定寄存器初值，结果不取反）
#[inline]
pub fn crc32c_raw(seed: u32, data: &[u8]) -> u32 {
    // crc crate 对反射算法的初值按未反射形式给出
    let mut digest = CRC32C.digest_with_initial(seed.reverse_bits());
    digest.update(data);
    digest.finalize() ^ !0
}

/// 目录项名字哈希（DIR_ITEM key 的 offset）
#[inline]
pub fn name_hash(name: &[u8]) -> u64 {
    crc32c_raw(BTRFS_NAME_HASH_SEED, name) as u64
}

/// XXH64，种子 0
#[inline]
pub fn xxhash64(data: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(data, 0)
}
