//! Extent 枚举器

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    tree::{IndexCursor, NodeSource, TreeReader},
    types::{FileExtentItem, Key, TreeRoot},
};

/// 一段带校验和的 extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentRecord {
    /// 文件内的逻辑偏移
    pub logical_offset: u64,
    /// 校验和覆盖的起始地址（disk_bytenr 加引用偏移）
    pub physical_offset: u64,
    /// 校验和覆盖的字节数
    pub length: u64,
}

enum State {
    Fresh,
    Walking,
    Done,
}

/// 一个 inode 的 extent 序列
///
/// 游标只在遍历期间存在：序列结束、出错或枚举器被丢弃时都会释放。
pub struct ExtentEnumerator<'r, S: NodeSource> {
    reader: &'r TreeReader<S>,
    tree: TreeRoot,
    inode: u64,
    cursor: Option<IndexCursor<'r, S>>,
    state: State,
    emitted: u64,
}

impl<'r, S: NodeSource> ExtentEnumerator<'r, S> {
    /// 创建枚举器（不访问索引，第一次 `next` 时才定位）
    ///
    /// # 参数
    ///
    /// * `reader` - 树读取器
    /// * `tree` - inode 所属子卷的树根
    /// * `inode` - inode 号
    pub fn new(reader: &'r TreeReader<S>, tree: TreeRoot, inode: u64) -> Self {
        Self {
            reader,
            tree,
            inode,
            cursor: None,
            state: State::Fresh,
            emitted: 0,
        }
    }

    /// 已产生的 extent 数
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// 定位到 `(inode, EXTENT_DATA, 0)`
    ///
    /// floor 查找可能落在前一条记录上（例如本 inode 的 INODE_ITEM），
    /// 向前越过所有小于起始 key 的记录。
    fn seek_start(&self) -> Result<IndexCursor<'r, S>> {
        let reader = self.reader;
        let start = Key::new(self.inode, BTRFS_EXTENT_DATA_KEY, 0);
        let mut cursor = match reader.floor_search(self.tree, &start) {
            Ok(cursor) => cursor,
            Err(e) if e.kind() == ErrorKind::NotFound => reader.first(self.tree)?,
            Err(e) => return Err(e),
        };

        while let Some(key) = cursor.key()? {
            if key >= start || !cursor.advance()? {
                break;
            }
        }
        Ok(cursor)
    }

    fn next_record(&mut self) -> Result<Option<ExtentRecord>> {
        if let State::Fresh = self.state {
            self.cursor = Some(self.seek_start()?);
            self.state = State::Walking;
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        loop {
            let Some(item) = cursor.item()? else {
                return Ok(None);
            };
            if item.key.objectid != self.inode {
                return Ok(None);
            }
            if item.key.item_type != BTRFS_EXTENT_DATA_KEY {
                log::error!(
                    "[EXTENT] inode {}: unexpected record {:?} in extent range",
                    self.inode,
                    item.key
                );
                return Err(Error::new(ErrorKind::InvalidData, "unexpected record type in extent range"));
            }

            let extent = FileExtentItem::decode(&item.data)?;
            cursor.advance()?;

            match extent.checksummed_range() {
                Some((physical_offset, length)) => {
                    let record = ExtentRecord {
                        logical_offset: item.key.offset,
                        physical_offset,
                        length,
                    };
                    log::trace!("[EXTENT] inode {} {:?}", self.inode, record);
                    self.emitted += 1;
                    return Ok(Some(record));
                }
                None => log::debug!(
                    "[EXTENT] inode {} offset {}: skip {:?} extent (hole={})",
                    self.inode,
                    item.key.offset,
                    extent.kind,
                    extent.is_hole()
                ),
            }
        }
    }

    fn finish(&mut self) {
        self.state = State::Done;
        self.cursor = None;
    }
}

impl<S: NodeSource> Iterator for ExtentEnumerator<'_, S> {
    type Item = Result<ExtentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Done = self.state {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finish();
                if self.emitted == 0 {
                    log::error!("[EXTENT] inode {} has no checksummed extents", self.inode);
                    Some(Err(Error::new(ErrorKind::NotFound, "inode has no extents")))
                } else {
                    None
                }
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{file_extent, inline_extent, inode_item, mem_tree, ExtentSpec, MODE_REG};
    use alloc::{vec, vec::Vec};

    fn ext_key(ino: u64, off: u64) -> Key {
        Key::new(ino, BTRFS_EXTENT_DATA_KEY, off)
    }

    fn inode_key(ino: u64) -> Key {
        Key::new(ino, BTRFS_INODE_ITEM_KEY, 0)
    }

    fn regular(disk: u64, len: u64) -> Vec<u8> {
        file_extent(ExtentSpec::regular(disk, len))
    }

    fn collect(reader: &TreeReader<crate::testutil::MemNodes>, root: TreeRoot, ino: u64) -> Result<Vec<ExtentRecord>> {
        ExtentEnumerator::new(reader, root, ino).collect()
    }

    #[test]
    fn test_multi_leaf_extents() {
        let mut items = vec![(inode_key(257), inode_item(40960, MODE_REG))];
        for i in 0..10u64 {
            items.push((ext_key(257, i * 4096), regular(0x100_0000 + i * 0x10000, 4096)));
        }
        items.push((inode_key(258), inode_item(0, MODE_REG)));
        items.push((ext_key(258, 0), regular(0x900_0000, 4096)));

        let (nodes, root) = mem_tree(3, items);
        let reader = TreeReader::new(nodes);
        let records = collect(&reader, root, 257).unwrap();

        assert_eq!(records.len(), 10);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.logical_offset, i as u64 * 4096);
            assert_eq!(r.physical_offset, 0x100_0000 + i as u64 * 0x10000);
            assert_eq!(r.length, 4096);
        }
        assert!(reader.stats().leaf_crossings > 0);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_floor_before_inode() {
        // 没有 INODE_ITEM 时 floor 落在前一个 inode 的记录上
        let items = vec![
            (ext_key(256, 0), regular(0x10_0000, 4096)),
            (ext_key(257, 0), regular(0x20_0000, 8192)),
        ];
        let (nodes, root) = mem_tree(4, items);
        let reader = TreeReader::new(nodes);
        let records = collect(&reader, root, 257).unwrap();
        assert_eq!(
            records,
            vec![ExtentRecord { logical_offset: 0, physical_offset: 0x20_0000, length: 8192 }]
        );
    }

    #[test]
    fn test_first_key_after_start() {
        // 树中所有 key 都大于起始 key：floor 查找失败后从第一条开始
        let items = vec![(ext_key(300, 0), regular(0x10_0000, 4096))];
        let (nodes, root) = mem_tree(4, items);
        let reader = TreeReader::new(nodes);
        assert_eq!(collect(&reader, root, 299).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(collect(&reader, root, 300).unwrap().len(), 1);
    }

    #[test]
    fn test_skips_inline_hole_prealloc() {
        let mut prealloc = ExtentSpec::regular(0x30_0000, 4096);
        prealloc.kind = BTRFS_FILE_EXTENT_PREALLOC;
        let mut partial = ExtentSpec::regular(0x40_0000, 16384);
        partial.offset = 4096;
        partial.num_bytes = 8192;
        let mut compressed = ExtentSpec::regular(0x50_0000, 4096);
        compressed.compression = 1;
        compressed.num_bytes = 65536;

        let items = vec![
            (ext_key(257, 0), inline_extent(b"tiny")),
            (ext_key(257, 4096), regular(0, 4096)),
            (ext_key(257, 8192), file_extent(prealloc)),
            (ext_key(257, 12288), file_extent(partial)),
            (ext_key(257, 20480), file_extent(compressed)),
        ];
        let (nodes, root) = mem_tree(2, items);
        let reader = TreeReader::new(nodes);
        let records = collect(&reader, root, 257).unwrap();

        assert_eq!(
            records,
            vec![
                ExtentRecord { logical_offset: 12288, physical_offset: 0x40_1000, length: 8192 },
                ExtentRecord { logical_offset: 20480, physical_offset: 0x50_0000, length: 4096 },
            ]
        );
    }

    #[test]
    fn test_no_extents() {
        let items = vec![
            (inode_key(257), inode_item(0, MODE_REG)),
            (ext_key(257, 0), inline_extent(b"only inline")),
            (inode_key(258), inode_item(0, MODE_REG)),
        ];
        let (nodes, root) = mem_tree(4, items);
        let reader = TreeReader::new(nodes);

        assert_eq!(collect(&reader, root, 257).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(collect(&reader, root, 258).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(collect(&reader, root, 999).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_unexpected_type_is_fatal() {
        let items = vec![
            (ext_key(257, 0), regular(0x10_0000, 4096)),
            (Key::new(257, BTRFS_EXTENT_CSUM_KEY, 0), vec![0u8; 8]),
            (ext_key(258, 0), regular(0x20_0000, 4096)),
        ];
        let (nodes, root) = mem_tree(2, items);
        let reader = TreeReader::new(nodes);

        let mut it = ExtentEnumerator::new(&reader, root, 257);
        assert!(it.next().unwrap().is_ok());
        assert_eq!(it.next().unwrap().unwrap_err().kind(), ErrorKind::InvalidData);
        assert!(it.next().is_none());
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_fresh_enumerator_seeks_once() {
        let items = vec![
            (inode_key(257), inode_item(8192, MODE_REG)),
            (ext_key(257, 0), regular(0x10_0000, 4096)),
            (ext_key(257, 4096), regular(0x20_0000, 4096)),
        ];
        let (nodes, root) = mem_tree(4, items);
        let reader = TreeReader::new(nodes);

        let mut it = ExtentEnumerator::new(&reader, root, 257);
        assert_eq!(reader.stats().searches, 0);
        let first = it.next().unwrap().unwrap();
        assert_eq!(first.physical_offset, 0x10_0000);
        assert_eq!(reader.stats().searches, 1);
        assert_eq!(it.next().unwrap().unwrap().physical_offset, 0x20_0000);
        assert!(it.next().is_none());
        assert_eq!(it.emitted(), 2);
        assert_eq!(reader.stats().searches, 1);
    }

    #[test]
    fn test_drop_midway_releases_cursor() {
        let items = (0..8u64)
            .map(|i| (ext_key(257, i * 4096), regular(0x10_0000 + i * 4096, 4096)))
            .collect();
        let (nodes, root) = mem_tree(2, items);
        let reader = TreeReader::new(nodes);

        let mut it = ExtentEnumerator::new(&reader, root, 257);
        it.next().unwrap().unwrap();
        assert!(reader.live_nodes() > 0);
        drop(it);
        assert_eq!(reader.live_nodes(), 0);
    }
}
