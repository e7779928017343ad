//! 校验和关联器
//!
//! 校验和树的 item：key 为 `(EXTENT_CSUM_OBJECTID, EXTENT_CSUM, 物理地址)`，
//! 数据是从该地址开始、每扇区一个的紧密排列摘要。

use super::digest::DigestSequence;
use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    tree::{Item, NodeSource, TreeReader},
    types::{Key, TreeRoot},
};
use alloc::vec::Vec;

/// 关联统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// 从根开始的 floor 查找次数
    pub seeks: u64,
    /// 读取的校验和条目数
    pub entries_read: u64,
    /// 直接从保留条目取得摘要的次数（无需查找）
    pub carried_hits: u64,
}

/// 一个校验和条目
#[derive(Debug, Clone)]
struct CsumEntry {
    start: u64,
    /// 覆盖范围的结束地址（不含），解码时已检查溢出
    end: u64,
    digests: Vec<u8>,
}

impl CsumEntry {
    fn count(&self, csum_size: usize) -> u64 {
        (self.digests.len() / csum_size) as u64
    }

    fn covers(&self, needle: u64) -> bool {
        self.start <= needle && needle < self.end
    }
}

/// 校验和关联器
pub struct ChecksumCorrelator<'r, S: NodeSource> {
    reader: &'r TreeReader<S>,
    csum_root: TreeRoot,
    sector_size: u32,
    csum_size: usize,
    carried: Option<CsumEntry>,
    stats: CorrelatorStats,
}

impl<'r, S: NodeSource> ChecksumCorrelator<'r, S> {
    /// 创建关联器
    ///
    /// # 参数
    ///
    /// * `reader` - 树读取器
    /// * `csum_root` - 校验和树根
    /// * `sector_size` - 数据扇区大小
    /// * `csum_size` - 每个摘要的长度
    pub fn new(reader: &'r TreeReader<S>, csum_root: TreeRoot, sector_size: u32, csum_size: usize) -> Self {
        Self {
            reader,
            csum_root,
            sector_size,
            csum_size,
            carried: None,
            stats: CorrelatorStats::default(),
        }
    }

    /// 统计
    pub fn stats(&self) -> CorrelatorStats {
        self.stats
    }

    /// 丢弃保留的条目，下一次关联从查找开始
    pub fn reset(&mut self) {
        self.carried = None;
    }

    /// 为 `[physical, physical + length)` 凑齐摘要
    ///
    /// # 返回
    ///
    /// 恰好 `length / sector_size` 个摘要，按物理地址升序
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - 没有覆盖起始地址的条目
    /// - `ErrorKind::Incomplete` - 凑齐之前条目中断（索引耗尽或出现空隙）
    /// - `ErrorKind::InvalidData` - 长度或地址未按扇区对齐、条目损坏
    pub fn correlate(&mut self, physical: u64, length: u64) -> Result<DigestSequence> {
        let sector = self.sector_size as u64;
        let mut seq = DigestSequence::new(physical, self.sector_size, self.csum_size);
        if length == 0 {
            return Ok(seq);
        }
        if length % sector != 0 || physical % sector != 0 {
            log::error!(
                "[CSUM] extent {:#x}+{} not aligned to sector size {}",
                physical,
                length,
                sector
            );
            return Err(Error::new(ErrorKind::InvalidData, "extent not aligned to sector size"));
        }

        let mut needle = physical;
        let mut pending = length / sector;

        if let Some(entry) = self.carried.take() {
            if entry.covers(needle) {
                self.stats.carried_hits += 1;
                let n = self.take(&entry, needle, pending, &mut seq);
                needle += n * sector;
                pending -= n;
                log::trace!("[CSUM] {} digests from carried entry {:#x}", n, entry.start);
            }
            self.carried = Some(entry);
        }

        if pending > 0 {
            self.walk(&mut seq, needle, pending)?;
        }

        debug_assert_eq!(seq.len() as u64, length / sector);
        Ok(seq)
    }

    /// 查找并沿索引向前，直到凑齐 `pending` 个摘要
    fn walk(&mut self, seq: &mut DigestSequence, mut needle: u64, mut pending: u64) -> Result<()> {
        let sector = self.sector_size as u64;

        self.stats.seeks += 1;
        let reader = self.reader;
        let cursor = reader.floor_search(self.csum_root, &csum_key(needle));
        let mut cursor = match cursor {
            Ok(cursor) => cursor,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(self.missing(seq, needle)),
            Err(e) => return Err(e),
        };

        let mut entry = match cursor.item()? {
            Some(item) if is_csum_item(&item) => self.decode(item)?,
            _ => return Err(self.missing(seq, needle)),
        };

        loop {
            if entry.covers(needle) {
                let n = self.take(&entry, needle, pending, seq);
                needle += n * sector;
                pending -= n;
                if pending == 0 {
                    self.carried = Some(entry);
                    return Ok(());
                }
            } else if seq.is_empty() || entry.end != needle {
                // 第一个条目不覆盖起点，或条目之间有空隙
                return Err(self.missing(seq, needle));
            }

            // 剩余摘要在索引顺序的下一个条目中
            if !cursor.advance()? {
                log::error!("[CSUM] index exhausted at {:#x}, {} digests missing", needle, pending);
                return Err(Error::new(ErrorKind::Incomplete, "checksum index exhausted"));
            }
            entry = match cursor.item()? {
                Some(item) if is_csum_item(&item) => self.decode(item)?,
                _ => {
                    log::error!("[CSUM] no checksum entries after {:#x}, {} digests missing", needle, pending);
                    return Err(Error::new(ErrorKind::Incomplete, "checksum index exhausted"));
                }
            };
        }
    }

    /// 从条目中取出从 `needle` 开始、最多 `pending` 个摘要
    fn take(&self, entry: &CsumEntry, needle: u64, pending: u64, seq: &mut DigestSequence) -> u64 {
        let sector = self.sector_size as u64;
        let skip = (needle - entry.start) / sector;
        let n = (entry.count(self.csum_size) - skip).min(pending);

        let from = skip as usize * self.csum_size;
        let to = from + n as usize * self.csum_size;
        seq.extend_packed(&entry.digests[from..to]);
        n
    }

    fn decode(&mut self, item: Item) -> Result<CsumEntry> {
        self.stats.entries_read += 1;
        let start = item.key.offset;
        if item.data.is_empty() || item.data.len() % self.csum_size != 0 {
            log::error!(
                "[CSUM] entry {:#x}: {} bytes is not a multiple of {}",
                start,
                item.data.len(),
                self.csum_size
            );
            return Err(Error::new(ErrorKind::InvalidData, "checksum item size not a multiple of csum size"));
        }
        if start % self.sector_size as u64 != 0 {
            log::error!("[CSUM] entry {:#x} not sector aligned", start);
            return Err(Error::new(ErrorKind::InvalidData, "checksum item not sector aligned"));
        }
        let count = (item.data.len() / self.csum_size) as u64;
        let end = count
            .checked_mul(self.sector_size as u64)
            .and_then(|span| start.checked_add(span))
            .ok_or_else(|| {
                log::error!("[CSUM] entry {:#x} with {} digests overflows the address space", start, count);
                Error::new(ErrorKind::InvalidData, "checksum item range overflows")
            })?;
        Ok(CsumEntry {
            start,
            end,
            digests: item.data,
        })
    }

    /// 第一个摘要都没有找到是 `NotFound`，找到一部分后中断是 `Incomplete`
    fn missing(&self, seq: &DigestSequence, needle: u64) -> Error {
        if seq.is_empty() {
            log::error!("[CSUM] no checksum entry covers {:#x}", needle);
            Error::new(ErrorKind::NotFound, "no checksum entry covers extent start")
        } else {
            log::error!(
                "[CSUM] checksum gap at {:#x} after {} digests",
                needle,
                seq.len()
            );
            Error::new(ErrorKind::Incomplete, "checksum entries stop before extent end")
        }
    }
}

fn csum_key(physical: u64) -> Key {
    Key::new(BTRFS_EXTENT_CSUM_OBJECTID, BTRFS_EXTENT_CSUM_KEY, physical)
}

fn is_csum_item(item: &Item) -> bool {
    item.key.objectid == BTRFS_EXTENT_CSUM_OBJECTID && item.key.item_type == BTRFS_EXTENT_CSUM_KEY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{csum_key as key, mem_tree, packed_crc, MemNodes};
    use alloc::vec;

    const MIB: u64 = 1 << 20;

    fn tree(fanout: usize, entries: Vec<(u64, Vec<u32>)>) -> (TreeReader<MemNodes>, TreeRoot) {
        let items = entries
            .into_iter()
            .map(|(phys, d)| (key(phys), packed_crc(&d)))
            .collect();
        let (nodes, root) = mem_tree(fanout, items);
        (TreeReader::new(nodes), root)
    }

    fn words(seq: &DigestSequence) -> Vec<u32> {
        seq.iter()
            .map(|(_, d)| u32::from_le_bytes([d[0], d[1], d[2], d[3]]))
            .collect()
    }

    #[test]
    fn test_single_entry() {
        let (reader, root) = tree(4, vec![(MIB, vec![0xAAAA_AAAA, 0xBBBB_BBBB, 0xCCCC_CCCC, 0xDDDD_DDDD])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);

        let seq = c.correlate(MIB, 4096).unwrap();
        assert_eq!(words(&seq), [0xAAAA_AAAA, 0xBBBB_BBBB, 0xCCCC_CCCC, 0xDDDD_DDDD]);
        assert_eq!(seq.as_bytes()[..4], [0xAA; 4]);
        assert_eq!(c.stats().seeks, 1);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_start_inside_entry() {
        let (reader, root) = tree(4, vec![(MIB, (0..8).collect())]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        let seq = c.correlate(MIB + 3 * 1024, 2048).unwrap();
        assert_eq!(words(&seq), [3, 4]);
        assert_eq!(seq.start(), MIB + 3 * 1024);
    }

    #[test]
    fn test_extent_spans_entries() {
        // 三个相邻条目，每个 2 个摘要，分布在不同叶子
        let (reader, root) = tree(
            2,
            vec![
                (MIB - 2048, vec![90, 91]),
                (MIB, vec![1, 2]),
                (MIB + 2048, vec![3, 4]),
                (MIB + 4096, vec![5, 6]),
            ],
        );
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        let seq = c.correlate(MIB + 1024, 5 * 1024).unwrap();

        assert_eq!(words(&seq), [2, 3, 4, 5, 6]);
        let stats = c.stats();
        assert_eq!(stats.seeks, 1);
        assert_eq!(stats.entries_read, 3);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_tail_reuse_without_seek() {
        let (reader, root) = tree(4, vec![(MIB, vec![10, 11, 12, 13, 14, 15])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);

        assert_eq!(words(&c.correlate(MIB, 2048).unwrap()), [10, 11]);
        let searches = reader.stats().searches;

        assert_eq!(words(&c.correlate(MIB + 2048, 4096).unwrap()), [12, 13, 14, 15]);
        assert_eq!(reader.stats().searches, searches);
        assert_eq!(c.stats().seeks, 1);
        assert_eq!(c.stats().carried_hits, 1);
    }

    #[test]
    fn test_carried_prefix_then_next_entry() {
        let (reader, root) = tree(2, vec![(MIB, vec![1, 2, 3]), (MIB + 3072, vec![4, 5])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);

        c.correlate(MIB, 1024).unwrap();
        let seq = c.correlate(MIB + 1024, 4096).unwrap();
        assert_eq!(words(&seq), [2, 3, 4, 5]);
        assert_eq!(c.stats().carried_hits, 1);
        assert_eq!(c.stats().seeks, 2);
    }

    #[test]
    fn test_zero_length_no_index_access() {
        let (reader, root) = tree(4, vec![(MIB, vec![1])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        let seq = c.correlate(MIB, 0).unwrap();
        assert!(seq.is_empty());
        assert_eq!(reader.stats().searches, 0);
        assert_eq!(reader.source().reads, 0);
    }

    #[test]
    fn test_not_found_vs_incomplete() {
        let (reader, root) = tree(
            2,
            vec![(MIB, vec![1, 2]), (MIB + 4096, vec![5, 6])],
        );

        // 起点之前没有条目
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB - 4096, 1024).unwrap_err().kind(), ErrorKind::NotFound);

        // 起点落在两个条目之间的空隙
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB + 2048, 1024).unwrap_err().kind(), ErrorKind::NotFound);

        // 凑到一半遇到空隙
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB, 4096).unwrap_err().kind(), ErrorKind::Incomplete);

        // 凑到一半索引耗尽
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB + 4096, 4096).unwrap_err().kind(), ErrorKind::Incomplete);

        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_misaligned_length() {
        let (reader, root) = tree(4, vec![(MIB, vec![1, 2])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB, 1000).unwrap_err().kind(), ErrorKind::InvalidData);
        assert_eq!(reader.stats().searches, 0);
    }

    #[test]
    fn test_corrupt_entry_size() {
        let (nodes, root) = mem_tree(4, vec![(key(MIB), vec![1, 2, 3])]);
        let reader = TreeReader::new(nodes);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(MIB, 1024).unwrap_err().kind(), ErrorKind::InvalidData);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_entry_past_address_space_is_invalid() {
        // 结束地址超出 u64 的条目
        let last = u64::MAX - 1023;
        let (reader, root) = tree(4, vec![(MIB, vec![1]), (last, vec![2, 3])]);
        let mut c = ChecksumCorrelator::new(&reader, root, 1024, 4);
        assert_eq!(c.correlate(last, 1024).unwrap_err().kind(), ErrorKind::InvalidData);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_length_property() {
        let digests: Vec<u32> = (0..64).collect();
        let (reader, root) = tree(3, vec![
            (MIB, digests[..20].to_vec()),
            (MIB + 20 * 4096, digests[20..41].to_vec()),
            (MIB + 41 * 4096, digests[41..].to_vec()),
        ]);
        let mut c = ChecksumCorrelator::new(&reader, root, 4096, 4);

        let mut offset = MIB;
        let mut all = Vec::new();
        for sectors in [1u64, 7, 19, 2, 30, 5] {
            let seq = c.correlate(offset, sectors * 4096).unwrap();
            assert_eq!(seq.len() as u64, sectors);
            assert!(seq.iter().all(|(_, d)| d.len() == 4));
            all.extend(words(&seq));
            offset += sectors * 4096;
        }
        assert_eq!(all, digests);
    }
}
