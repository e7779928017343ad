//! btrfs 文件系统句柄（只读）

use super::{
    nodes::DeviceNodes,
    roots::{default_subvolume, read_root},
    types::{FsConfig, FsLayout},
};
use crate::{
    block::{BlockDev, BlockDevice},
    chunk::ChunkMap,
    consts::*,
    crypto::{Checksummer, CryptoProvider, DefaultProvider},
    error::{ErrorKind, Result},
    superblock::{checksum::verify_checksum, Superblock},
    tree::TreeReader,
    types::{ChunkItem, RootItem, TreeRoot},
};
use alloc::{vec, vec::Vec};

/// 已打开的 btrfs 文件系统
///
/// # 示例
///
/// ```rust,ignore
/// use btrfs_csum::{BtrfsFs, FileDevice, FsConfig};
///
/// let fs = BtrfsFs::open(FileDevice::new("/dev/sdb1")?, FsConfig::default())?;
/// let layout = fs.layout();
/// println!("sector {} csum {}", layout.sector_size, layout.csum_size);
/// ```
pub struct BtrfsFs<D: BlockDevice, P: CryptoProvider = DefaultProvider> {
    reader: TreeReader<DeviceNodes<D, P>>,
    sb: Superblock,
    summer: Checksummer<P>,
    csum_root: TreeRoot,
    default_subvol: u64,
}

impl<D: BlockDevice> BtrfsFs<D, DefaultProvider> {
    /// 打开文件系统（构建时选定的密码学后端）
    ///
    /// # 错误
    ///
    /// - `ErrorKind::Resource` - 设备无法打开
    /// - `ErrorKind::InvalidInput` - 不是 btrfs 或几何参数非法
    /// - `ErrorKind::InvalidKey` - HMAC 文件系统缺少认证密钥
    /// - `ErrorKind::InvalidData` - superblock / 节点校验和不符，元数据损坏
    /// - `ErrorKind::Unsupported` - 未知校验和类型或条带化 profile
    pub fn open(device: D, config: FsConfig) -> Result<Self> {
        Self::open_with_provider(device, DefaultProvider::default(), config)
    }
}

impl<D: BlockDevice, P: CryptoProvider + Clone> BtrfsFs<D, P> {
    /// 打开文件系统，使用指定的密码学后端
    ///
    /// 引导顺序：superblock → 校验和算法 → superblock 校验和 →
    /// sys_chunk_array → chunk 树 → 校验和树根 → 默认子卷。
    /// 任何一步失败时设备随已构造的对象一起关闭。
    pub fn open_with_provider(device: D, provider: P, config: FsConfig) -> Result<Self> {
        let mut bdev = BlockDev::new(device)?;
        let (sb, raw) = Superblock::load(&mut bdev)?;

        let algorithm = sb.algorithm()?;
        let summer = Checksummer::with_provider(algorithm, provider, config.auth_key.as_deref())?;
        if config.verify_metadata {
            verify_checksum(&raw, &summer)?;
        } else {
            log::warn!("[FS] metadata checksum verification disabled");
        }

        let chunks = ChunkMap::from_sys_chunk_array(&sb.sys_chunk_array, sb.devid)?;
        let nodes = DeviceNodes::new(
            bdev,
            chunks,
            sb.nodesize,
            sb.fsid,
            summer.clone(),
            config.verify_metadata,
            config.node_cache_size,
        );
        let reader = TreeReader::new(nodes);
        load_chunk_tree(&reader, sb.chunk_root)?;

        let csum_root = read_root(&reader, sb.root, BTRFS_CSUM_TREE_OBJECTID)?.root;
        let default_subvol = default_subvolume(&reader, sb.root, sb.root_dir_objectid)?;

        log::info!(
            "[FS] opened: label={:?} csum={} sector={} chunks={} default_subvol={}",
            sb.label(),
            algorithm,
            sb.sectorsize,
            reader.source().chunks().len(),
            default_subvol
        );

        Ok(Self {
            reader,
            sb,
            summer,
            csum_root,
            default_subvol,
        })
    }
}

impl<D: BlockDevice, P: CryptoProvider> BtrfsFs<D, P> {
    /// 树读取器
    pub fn reader(&self) -> &TreeReader<DeviceNodes<D, P>> {
        &self.reader
    }

    /// superblock
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// 数据校验和计算器
    pub fn checksummer(&self) -> &Checksummer<P> {
        &self.summer
    }

    /// 默认子卷 id
    pub fn default_subvolume(&self) -> u64 {
        self.default_subvol
    }

    /// 流水线参数
    pub fn layout(&self) -> FsLayout {
        FsLayout {
            root_tree: self.sb.root,
            csum_root: self.csum_root,
            sector_size: self.sb.sectorsize,
            csum_size: self.summer.digest_size(),
            default_subvol: self.default_subvol,
        }
    }

    /// 读取子卷（或内部树）的根描述
    pub fn read_root(&self, id: u64) -> Result<RootItem> {
        read_root(&self.reader, self.sb.root, id)
    }

    /// 按逻辑地址读取数据
    pub fn read_data(&self, logical: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.source_mut().read_logical(logical, &mut buf)?;
        Ok(buf)
    }
}

/// 把 chunk 树中所有 CHUNK_ITEM 加入映射
fn load_chunk_tree<D: BlockDevice, P: CryptoProvider>(
    reader: &TreeReader<DeviceNodes<D, P>>,
    chunk_root: TreeRoot,
) -> Result<()> {
    let mut found = Vec::new();
    {
        let mut cursor = match reader.first(chunk_root) {
            Ok(cursor) => cursor,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        while let Some(item) = cursor.item()? {
            if item.key.item_type == BTRFS_CHUNK_ITEM_KEY {
                let (chunk, _) = ChunkItem::decode(&item.data)?;
                found.push((item.key.offset, chunk));
            }
            if !cursor.advance()? {
                break;
            }
        }
    }

    let mut source = reader.source_mut();
    for (logical, chunk) in &found {
        source.chunks_mut().insert(*logical, chunk)?;
    }
    log::debug!("[FS] chunk tree: {} chunks", found.len());
    Ok(())
}
