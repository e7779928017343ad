//! 摘要序列

use alloc::vec::Vec;

/// 一段 extent 的摘要序列
///
/// 摘要按磁盘字节序紧密排列，第 `i` 个摘要覆盖 `start + i * sector_size`
/// 开始的一个扇区。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSequence {
    start: u64,
    sector_size: u32,
    csum_size: usize,
    bytes: Vec<u8>,
}

impl DigestSequence {
    /// 创建空序列
    pub fn new(start: u64, sector_size: u32, csum_size: usize) -> Self {
        Self {
            start,
            sector_size,
            csum_size,
            bytes: Vec::new(),
        }
    }

    pub(crate) fn extend_packed(&mut self, packed: &[u8]) {
        debug_assert_eq!(packed.len() % self.csum_size, 0);
        self.bytes.extend_from_slice(packed);
    }

    /// 第一个摘要覆盖的物理地址
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 每个摘要的长度
    pub fn csum_size(&self) -> usize {
        self.csum_size
    }

    /// 扇区大小
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// 摘要个数
    pub fn len(&self) -> usize {
        self.bytes.len() / self.csum_size
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 第 `index` 个摘要
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let off = index.checked_mul(self.csum_size)?;
        self.bytes.get(off..off + self.csum_size)
    }

    /// 紧密排列的原始字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `(物理地址, 摘要)` 迭代器
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        let step = self.sector_size as u64;
        self.bytes
            .chunks_exact(self.csum_size)
            .enumerate()
            .map(move |(i, d)| (self.start + i as u64 * step, d))
    }
}
