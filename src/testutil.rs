//! 测试辅助：按磁盘格式编码节点、树和完整镜像

use crate::{
    consts::*,
    crypto::{ChecksumAlgorithm, Checksummer},
    error::{Error, ErrorKind, Result},
    tree::NodeSource,
    types::{Key, TreeRoot},
};
use alloc::{collections::BTreeMap, vec, vec::Vec};
use byteorder::{ByteOrder, LittleEndian};

//=============================================================================
// 节点编码
//=============================================================================

fn write_key(buf: &mut [u8], key: &Key) {
    LittleEndian::write_u64(&mut buf[0..8], key.objectid);
    buf[8] = key.item_type;
    LittleEndian::write_u64(&mut buf[9..17], key.offset);
}

fn write_header(buf: &mut [u8], bytenr: u64, owner: u64, nritems: usize, level: u8) {
    LittleEndian::write_u64(&mut buf[0x30..0x38], bytenr);
    LittleEndian::write_u64(&mut buf[0x50..0x58], 1);
    LittleEndian::write_u64(&mut buf[0x58..0x60], owner);
    LittleEndian::write_u32(&mut buf[0x60..0x64], nritems as u32);
    buf[0x64] = level;
}

/// 编码叶子节点，item 数据从节点尾部向前排列
pub(crate) fn encode_leaf(node_size: u32, bytenr: u64, owner: u64, items: &[(Key, Vec<u8>)]) -> Vec<u8> {
    let mut buf = vec![0u8; node_size as usize];
    write_header(&mut buf, bytenr, owner, items.len(), 0);

    let mut data_end = node_size as usize - BTRFS_HEADER_SIZE;
    for (i, (key, data)) in items.iter().enumerate() {
        let off = BTRFS_HEADER_SIZE + i * BTRFS_ITEM_SIZE;
        assert!(data_end >= data.len(), "leaf overflow");
        data_end -= data.len();
        assert!(off + BTRFS_ITEM_SIZE <= BTRFS_HEADER_SIZE + data_end, "leaf overflow");

        write_key(&mut buf[off..], key);
        LittleEndian::write_u32(&mut buf[off + 17..off + 21], data_end as u32);
        LittleEndian::write_u32(&mut buf[off + 21..off + 25], data.len() as u32);
        let abs = BTRFS_HEADER_SIZE + data_end;
        buf[abs..abs + data.len()].copy_from_slice(data);
    }
    buf
}

/// 编码内部节点
pub(crate) fn encode_internal(
    node_size: u32,
    bytenr: u64,
    owner: u64,
    level: u8,
    ptrs: &[(Key, u64)],
) -> Vec<u8> {
    let mut buf = vec![0u8; node_size as usize];
    write_header(&mut buf, bytenr, owner, ptrs.len(), level);
    for (i, (key, blockptr)) in ptrs.iter().enumerate() {
        let off = BTRFS_HEADER_SIZE + i * BTRFS_KEY_PTR_SIZE;
        write_key(&mut buf[off..], key);
        LittleEndian::write_u64(&mut buf[off + 17..off + 25], *blockptr);
        LittleEndian::write_u64(&mut buf[off + 25..off + 33], 1);
    }
    buf
}

//=============================================================================
// 树构建
//=============================================================================

/// 内存中的节点集合
#[derive(Default)]
pub(crate) struct MemNodes {
    pub nodes: BTreeMap<u64, Vec<u8>>,
    pub reads: usize,
}

impl NodeSource for MemNodes {
    fn read_node(&mut self, bytenr: u64) -> Result<Vec<u8>> {
        self.reads += 1;
        self.nodes
            .get(&bytenr)
            .cloned()
            .ok_or(Error::new(ErrorKind::Io, "no node at bytenr"))
    }
}

/// 把有序 item 打包成多层树
pub(crate) struct TreeBuilder {
    pub node_size: u32,
    pub fanout: usize,
    next_bytenr: u64,
    summer: Option<Checksummer>,
    pub nodes: BTreeMap<u64, Vec<u8>>,
}

impl TreeBuilder {
    pub fn new(node_size: u32, fanout: usize, start: u64) -> Self {
        assert!(fanout >= 2);
        Self {
            node_size,
            fanout,
            next_bytenr: start,
            summer: None,
            nodes: BTreeMap::new(),
        }
    }

    /// 写入节点校验和
    pub fn with_node_csum(mut self, summer: Checksummer) -> Self {
        self.summer = Some(summer);
        self
    }

    fn alloc(&mut self) -> u64 {
        let bytenr = self.next_bytenr;
        self.next_bytenr += self.node_size as u64;
        bytenr
    }

    fn finish(&mut self, bytenr: u64, mut buf: Vec<u8>) {
        if let Some(summer) = &self.summer {
            let size = summer.digest_size();
            let digest = summer.compute(&buf[0x20..]).unwrap();
            buf[..size].copy_from_slice(&digest);
        }
        self.nodes.insert(bytenr, buf);
    }

    pub fn build(&mut self, owner: u64, mut items: Vec<(Key, Vec<u8>)>) -> TreeRoot {
        items.sort_by_key(|(k, _)| *k);

        let mut level_nodes: Vec<(Key, u64)> = Vec::new();
        if items.is_empty() {
            let bytenr = self.alloc();
            let buf = encode_leaf(self.node_size, bytenr, owner, &[]);
            self.finish(bytenr, buf);
            return TreeRoot { bytenr, level: 0 };
        }

        for chunk in items.chunks(self.fanout) {
            let bytenr = self.alloc();
            let buf = encode_leaf(self.node_size, bytenr, owner, chunk);
            self.finish(bytenr, buf);
            level_nodes.push((chunk[0].0, bytenr));
        }

        let mut level = 0u8;
        while level_nodes.len() > 1 {
            level += 1;
            let mut next = Vec::new();
            for chunk in level_nodes.chunks(self.fanout) {
                let bytenr = self.alloc();
                let buf = encode_internal(self.node_size, bytenr, owner, level, chunk);
                self.finish(bytenr, buf);
                next.push((chunk[0].0, bytenr));
            }
            level_nodes = next;
        }

        TreeRoot {
            bytenr: level_nodes[0].1,
            level,
        }
    }

    pub fn into_mem(self) -> MemNodes {
        MemNodes {
            nodes: self.nodes,
            reads: 0,
        }
    }
}

/// 单棵树的快捷构建
pub(crate) fn mem_tree(fanout: usize, items: Vec<(Key, Vec<u8>)>) -> (MemNodes, TreeRoot) {
    let mut builder = TreeBuilder::new(4096, fanout, 0x10_0000);
    let root = builder.build(BTRFS_FS_TREE_OBJECTID, items);
    (builder.into_mem(), root)
}

//=============================================================================
// item 编码
//=============================================================================

pub(crate) fn inode_item(size: u64, mode: u32) -> Vec<u8> {
    let mut buf = vec![0u8; BTRFS_INODE_ITEM_SIZE];
    LittleEndian::write_u64(&mut buf[0..8], 1);
    LittleEndian::write_u64(&mut buf[16..24], size);
    LittleEndian::write_u64(&mut buf[24..32], size);
    LittleEndian::write_u32(&mut buf[40..44], 1);
    LittleEndian::write_u32(&mut buf[52..56], mode);
    buf
}

pub(crate) const MODE_DIR: u32 = 0o040755;
pub(crate) const MODE_REG: u32 = 0o100644;

pub(crate) fn root_item(root: TreeRoot, root_dirid: u64) -> Vec<u8> {
    let mut buf = vec![0u8; 439];
    buf[..BTRFS_INODE_ITEM_SIZE].copy_from_slice(&inode_item(3, MODE_DIR));
    LittleEndian::write_u64(&mut buf[160..168], 1);
    LittleEndian::write_u64(&mut buf[168..176], root_dirid);
    LittleEndian::write_u64(&mut buf[176..184], root.bytenr);
    LittleEndian::write_u32(&mut buf[216..220], 1);
    buf[238] = root.level;
    buf
}

pub(crate) fn dir_entry(location: Key, file_type: u8, name: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; BTRFS_DIR_ITEM_HEADER_SIZE];
    write_key(&mut buf, &location);
    LittleEndian::write_u64(&mut buf[17..25], 1);
    LittleEndian::write_u16(&mut buf[27..29], name.len() as u16);
    buf[29] = file_type;
    buf.extend_from_slice(name);
    buf
}

/// file extent 编码参数
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExtentSpec {
    pub kind: u8,
    pub compression: u8,
    pub disk_bytenr: u64,
    pub disk_num_bytes: u64,
    pub offset: u64,
    pub num_bytes: u64,
}

impl ExtentSpec {
    pub fn regular(disk_bytenr: u64, len: u64) -> Self {
        Self {
            kind: BTRFS_FILE_EXTENT_REG,
            compression: 0,
            disk_bytenr,
            disk_num_bytes: len,
            offset: 0,
            num_bytes: len,
        }
    }
}

pub(crate) fn file_extent(spec: ExtentSpec) -> Vec<u8> {
    let mut buf = vec![0u8; BTRFS_FILE_EXTENT_ITEM_SIZE];
    LittleEndian::write_u64(&mut buf[0..8], 1);
    LittleEndian::write_u64(&mut buf[8..16], spec.num_bytes);
    buf[16] = spec.compression;
    buf[20] = spec.kind;
    LittleEndian::write_u64(&mut buf[21..29], spec.disk_bytenr);
    LittleEndian::write_u64(&mut buf[29..37], spec.disk_num_bytes);
    LittleEndian::write_u64(&mut buf[37..45], spec.offset);
    LittleEndian::write_u64(&mut buf[45..53], spec.num_bytes);
    buf
}

pub(crate) fn inline_extent(data: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 21];
    LittleEndian::write_u64(&mut buf[8..16], data.len() as u64);
    buf[20] = BTRFS_FILE_EXTENT_INLINE;
    buf.extend_from_slice(data);
    buf
}

/// 把 u32 摘要按小端打包（CRC32C 校验和条目）
pub(crate) fn packed_crc(digests: &[u32]) -> Vec<u8> {
    digests.iter().flat_map(|d| d.to_le_bytes()).collect()
}

pub(crate) fn csum_key(physical: u64) -> Key {
    Key::new(BTRFS_EXTENT_CSUM_OBJECTID, BTRFS_EXTENT_CSUM_KEY, physical)
}

pub(crate) fn chunk_item(length: u64, chunk_type: u64, physical: u64) -> Vec<u8> {
    let mut buf = vec![0u8; BTRFS_CHUNK_ITEM_SIZE + BTRFS_STRIPE_SIZE];
    LittleEndian::write_u64(&mut buf[0..8], length);
    LittleEndian::write_u64(&mut buf[8..16], BTRFS_CHUNK_TREE_OBJECTID);
    LittleEndian::write_u64(&mut buf[16..24], 64 * 1024);
    LittleEndian::write_u64(&mut buf[24..32], chunk_type);
    LittleEndian::write_u32(&mut buf[32..36], 4096);
    LittleEndian::write_u32(&mut buf[36..40], 4096);
    LittleEndian::write_u32(&mut buf[40..44], 4096);
    LittleEndian::write_u16(&mut buf[44..46], 1);
    LittleEndian::write_u64(&mut buf[48..56], 1);
    LittleEndian::write_u64(&mut buf[56..64], physical);
    buf
}

//=============================================================================
// 完整镜像
//=============================================================================

/// 单设备、单 chunk（逻辑地址 == 物理地址）的最小镜像
pub(crate) struct ImageBuilder {
    pub sector_size: u32,
    pub node_size: u32,
    pub fanout: usize,
    pub image_size: u64,
    pub algorithm: ChecksumAlgorithm,
    pub auth_key: Option<Vec<u8>>,
    pub devid: u64,
    data: Vec<(u64, Vec<u8>)>,
    subvols: BTreeMap<u64, BTreeMap<Key, Vec<u8>>>,
    csums: Vec<(Key, Vec<u8>)>,
    default_subvol: Option<u64>,
}

/// 元数据节点从 4 MiB 开始分配
pub(crate) const META_START: u64 = 4 << 20;

impl ImageBuilder {
    pub fn new(sector_size: u32, algorithm: ChecksumAlgorithm) -> Self {
        let mut builder = Self {
            sector_size,
            node_size: 4096,
            fanout: 4,
            image_size: 8 << 20,
            algorithm,
            auth_key: None,
            devid: 1,
            data: Vec::new(),
            subvols: BTreeMap::new(),
            csums: Vec::new(),
            default_subvol: None,
        };
        builder.ensure_subvol(BTRFS_FS_TREE_OBJECTID);
        builder
    }

    pub fn summer(&self) -> Checksummer {
        Checksummer::new(self.algorithm, self.auth_key.as_deref()).unwrap()
    }

    fn ensure_subvol(&mut self, id: u64) -> &mut BTreeMap<Key, Vec<u8>> {
        self.subvols.entry(id).or_insert_with(|| {
            let mut items = BTreeMap::new();
            items.insert(
                Key::new(BTRFS_FIRST_FREE_OBJECTID, BTRFS_INODE_ITEM_KEY, 0),
                inode_item(0, MODE_DIR),
            );
            items
        })
    }

    fn add_dir_entry(&mut self, subvol: u64, parent: u64, name: &str, location: Key, file_type: u8) {
        let key = Key::new(parent, BTRFS_DIR_ITEM_KEY, crate::crypto::crc::name_hash(name.as_bytes()));
        let entry = dir_entry(location, file_type, name.as_bytes());
        self.ensure_subvol(subvol).entry(key).or_default().extend_from_slice(&entry);
    }

    pub fn add_dir(&mut self, subvol: u64, parent: u64, name: &str, ino: u64) {
        self.add_dir_entry(subvol, parent, name, Key::new(ino, BTRFS_INODE_ITEM_KEY, 0), 2);
        self.ensure_subvol(subvol)
            .insert(Key::new(ino, BTRFS_INODE_ITEM_KEY, 0), inode_item(0, MODE_DIR));
    }

    pub fn add_file(&mut self, subvol: u64, parent: u64, name: &str, ino: u64, size: u64) {
        self.add_dir_entry(subvol, parent, name, Key::new(ino, BTRFS_INODE_ITEM_KEY, 0), 1);
        self.ensure_subvol(subvol)
            .insert(Key::new(ino, BTRFS_INODE_ITEM_KEY, 0), inode_item(size, MODE_REG));
    }

    pub fn add_subvolume(&mut self, parent_subvol: u64, parent_ino: u64, name: &str, id: u64) {
        self.add_dir_entry(
            parent_subvol,
            parent_ino,
            name,
            Key::new(id, BTRFS_ROOT_ITEM_KEY, u64::MAX),
            2,
        );
        self.ensure_subvol(id);
    }

    /// 去掉子卷的树和 ROOT_ITEM（目录项保留）
    pub fn forget_subvol(&mut self, id: u64) {
        self.subvols.remove(&id);
    }

    pub fn add_item(&mut self, subvol: u64, key: Key, data: Vec<u8>) {
        self.ensure_subvol(subvol).insert(key, data);
    }

    pub fn add_extent(&mut self, subvol: u64, ino: u64, logical: u64, spec: ExtentSpec) {
        self.add_item(subvol, Key::new(ino, BTRFS_EXTENT_DATA_KEY, logical), file_extent(spec));
    }

    pub fn add_csum(&mut self, physical: u64, packed: Vec<u8>) {
        self.csums.push((csum_key(physical), packed));
    }

    pub fn write_data(&mut self, physical: u64, data: Vec<u8>) {
        self.data.push((physical, data));
    }

    /// 写入数据、登记 extent，并按扇区计算校验和条目
    pub fn add_data_extent(&mut self, subvol: u64, ino: u64, logical: u64, physical: u64, data: Vec<u8>) {
        let summer = self.summer();
        let mut packed = Vec::new();
        for sector in data.chunks(self.sector_size as usize) {
            packed.extend_from_slice(&summer.compute(sector).unwrap());
        }
        self.add_extent(subvol, ino, logical, ExtentSpec::regular(physical, data.len() as u64));
        self.add_csum(physical, packed);
        self.write_data(physical, data);
    }

    pub fn set_default_subvol(&mut self, id: u64) {
        self.default_subvol = Some(id);
    }

    pub fn build(self) -> Vec<u8> {
        let summer = self.summer();
        let mut trees = TreeBuilder::new(self.node_size, self.fanout, META_START)
            .with_node_csum(summer.clone());

        // chunk tree
        let chunk_key = Key::new(BTRFS_FIRST_CHUNK_TREE_OBJECTID, BTRFS_CHUNK_ITEM_KEY, 0);
        let chunk = chunk_item(self.image_size, 0x7, 0);
        let chunk_root = trees.build(BTRFS_CHUNK_TREE_OBJECTID, vec![(chunk_key, chunk.clone())]);

        // 子卷树
        let mut root_items = Vec::new();
        for (id, items) in &self.subvols {
            let root = trees.build(*id, items.iter().map(|(k, v)| (*k, v.clone())).collect());
            root_items.push((
                Key::new(*id, BTRFS_ROOT_ITEM_KEY, 0),
                root_item(root, BTRFS_FIRST_FREE_OBJECTID),
            ));
        }

        // 校验和树
        let csum_root = trees.build(BTRFS_CSUM_TREE_OBJECTID, self.csums.clone());
        root_items.push((
            Key::new(BTRFS_CSUM_TREE_OBJECTID, BTRFS_ROOT_ITEM_KEY, 0),
            root_item(csum_root, 0),
        ));

        if let Some(id) = self.default_subvol {
            let name = BTRFS_DEFAULT_SUBVOL_NAME.as_bytes();
            root_items.push((
                Key::new(
                    BTRFS_ROOT_TREE_DIR_OBJECTID,
                    BTRFS_DIR_ITEM_KEY,
                    crate::crypto::crc::name_hash(name),
                ),
                dir_entry(Key::new(id, BTRFS_ROOT_ITEM_KEY, u64::MAX), 2, name),
            ));
        }
        let root_root = trees.build(BTRFS_ROOT_TREE_OBJECTID, root_items);

        let mut image = vec![0u8; self.image_size as usize];
        for (bytenr, node) in &trees.nodes {
            let at = *bytenr as usize;
            image[at..at + node.len()].copy_from_slice(node);
        }
        for (physical, data) in &self.data {
            let at = *physical as usize;
            image[at..at + data.len()].copy_from_slice(data);
        }

        // superblock
        let mut sb = vec![0u8; BTRFS_SUPER_INFO_SIZE];
        LittleEndian::write_u64(&mut sb[0x30..0x38], BTRFS_SUPER_INFO_OFFSET);
        LittleEndian::write_u64(&mut sb[0x40..0x48], BTRFS_MAGIC);
        LittleEndian::write_u64(&mut sb[0x48..0x50], 1);
        LittleEndian::write_u64(&mut sb[0x50..0x58], root_root.bytenr);
        LittleEndian::write_u64(&mut sb[0x58..0x60], chunk_root.bytenr);
        LittleEndian::write_u64(&mut sb[0x70..0x78], self.image_size);
        LittleEndian::write_u64(&mut sb[0x80..0x88], BTRFS_ROOT_TREE_DIR_OBJECTID);
        LittleEndian::write_u64(&mut sb[0x88..0x90], 1);
        LittleEndian::write_u64(&mut sb[0xc9..0xd1], self.devid);
        LittleEndian::write_u32(&mut sb[0x90..0x94], self.sector_size);
        LittleEndian::write_u32(&mut sb[0x94..0x98], self.node_size);
        LittleEndian::write_u32(&mut sb[0x98..0x9c], self.node_size);
        LittleEndian::write_u32(&mut sb[0x9c..0xa0], self.sector_size);
        LittleEndian::write_u16(&mut sb[0xc4..0xc6], self.algorithm.to_disk());
        sb[0xc6] = root_root.level;
        sb[0xc7] = chunk_root.level;

        let mut sys = Vec::new();
        let mut key_buf = [0u8; BTRFS_DISK_KEY_SIZE];
        write_key(&mut key_buf, &chunk_key);
        sys.extend_from_slice(&key_buf);
        sys.extend_from_slice(&chunk);
        LittleEndian::write_u32(&mut sb[0xa0..0xa4], sys.len() as u32);
        let at = BTRFS_SUPER_SYS_CHUNK_ARRAY_OFFSET;
        sb[at..at + sys.len()].copy_from_slice(&sys);

        let digest = summer.compute(&sb[0x20..]).unwrap();
        sb[..digest.len()].copy_from_slice(&digest);

        let at = BTRFS_SUPER_INFO_OFFSET as usize;
        image[at..at + sb.len()].copy_from_slice(&sb);
        image
    }
}
