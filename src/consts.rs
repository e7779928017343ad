//! btrfs 磁盘格式常量定义
//!
//! 这个模块包含了校验和恢复所需的 btrfs 常量，包括：
//! - superblock 布局
//! - 树节点布局
//! - key 类型与保留 objectid
//! - 校验和类型

//=============================================================================
// 基础常量
//=============================================================================

/// 块设备默认扇区大小（512 字节）
pub const BTRFS_DEFAULT_DEVICE_SECTOR: u32 = 512;

/// 允许的最小数据扇区大小
pub const BTRFS_MIN_SECTORSIZE: u32 = 512;

/// 允许的最大节点/扇区大小（64 KiB）
pub const BTRFS_MAX_METADATA_BLOCKSIZE: u32 = 65536;

/// 小于该大小的文件直接拒绝（在访问任何索引之前）
pub const BTRFS_MIN_DUMP_FILE_SIZE: u64 = 1024;

/// 校验和字段的最大长度
pub const BTRFS_CSUM_SIZE: usize = 32;

/// fsid / uuid 长度
pub const BTRFS_UUID_SIZE: usize = 16;

//=============================================================================
// Superblock 相关
//=============================================================================

/// 主 superblock 在设备上的字节偏移（64 KiB）
pub const BTRFS_SUPER_INFO_OFFSET: u64 = 0x10000;

/// superblock 大小（字节）
pub const BTRFS_SUPER_INFO_SIZE: usize = 4096;

/// superblock 魔数 "_BHRfS_M"
pub const BTRFS_MAGIC: u64 = 0x4D5F_5366_5248_425F;

/// sys_chunk_array 在 superblock 中的偏移
pub const BTRFS_SUPER_SYS_CHUNK_ARRAY_OFFSET: usize = 0x32b;

/// sys_chunk_array 最大长度
pub const BTRFS_SYSTEM_CHUNK_ARRAY_SIZE: usize = 2048;

//=============================================================================
// 树节点布局
//=============================================================================

/// 节点头大小
pub const BTRFS_HEADER_SIZE: usize = 101;

/// 磁盘 key 大小（objectid u64 + type u8 + offset u64）
pub const BTRFS_DISK_KEY_SIZE: usize = 17;

/// 叶子节点 item 头大小（key + offset u32 + size u32）
pub const BTRFS_ITEM_SIZE: usize = 25;

/// 内部节点 key 指针大小（key + blockptr u64 + generation u64）
pub const BTRFS_KEY_PTR_SIZE: usize = 33;

/// 树的最大高度
pub const BTRFS_MAX_LEVEL: u8 = 8;

//=============================================================================
// Key 类型
//=============================================================================

/// inode 元数据
pub const BTRFS_INODE_ITEM_KEY: u8 = 1;
/// inode 反向引用
pub const BTRFS_INODE_REF_KEY: u8 = 12;
/// 目录项（按名字哈希）
pub const BTRFS_DIR_ITEM_KEY: u8 = 84;
/// 目录项（按索引）
pub const BTRFS_DIR_INDEX_KEY: u8 = 96;
/// 文件 extent
pub const BTRFS_EXTENT_DATA_KEY: u8 = 108;
/// 数据校验和
pub const BTRFS_EXTENT_CSUM_KEY: u8 = 128;
/// 树根描述
pub const BTRFS_ROOT_ITEM_KEY: u8 = 132;
/// chunk 映射
pub const BTRFS_CHUNK_ITEM_KEY: u8 = 228;

//=============================================================================
// 保留 objectid
//=============================================================================

/// root tree
pub const BTRFS_ROOT_TREE_OBJECTID: u64 = 1;
/// chunk tree
pub const BTRFS_CHUNK_TREE_OBJECTID: u64 = 3;
/// 默认文件系统树（顶层子卷）
pub const BTRFS_FS_TREE_OBJECTID: u64 = 5;
/// root tree 中保存 "default" 目录项的目录
pub const BTRFS_ROOT_TREE_DIR_OBJECTID: u64 = 6;
/// 校验和树
pub const BTRFS_CSUM_TREE_OBJECTID: u64 = 7;
/// 第一个普通 inode / 子卷根目录 inode
pub const BTRFS_FIRST_FREE_OBJECTID: u64 = 256;
/// chunk item 的 objectid
pub const BTRFS_FIRST_CHUNK_TREE_OBJECTID: u64 = 256;
/// 校验和 item 的 objectid（-10）
pub const BTRFS_EXTENT_CSUM_OBJECTID: u64 = (-10i64) as u64;

//=============================================================================
// 文件 extent
//=============================================================================

/// 内联 extent（数据存放在 item 内）
pub const BTRFS_FILE_EXTENT_INLINE: u8 = 0;
/// 普通 extent
pub const BTRFS_FILE_EXTENT_REG: u8 = 1;
/// 预分配 extent（无数据、无校验和）
pub const BTRFS_FILE_EXTENT_PREALLOC: u8 = 2;

/// 非内联 file extent item 的大小
pub const BTRFS_FILE_EXTENT_ITEM_SIZE: usize = 53;

//=============================================================================
// Chunk 类型（RAID profile 位）
//=============================================================================

/// RAID0
pub const BTRFS_BLOCK_GROUP_RAID0: u64 = 1 << 3;
/// RAID1
pub const BTRFS_BLOCK_GROUP_RAID1: u64 = 1 << 4;
/// DUP
pub const BTRFS_BLOCK_GROUP_DUP: u64 = 1 << 5;
/// RAID10
pub const BTRFS_BLOCK_GROUP_RAID10: u64 = 1 << 6;
/// RAID5
pub const BTRFS_BLOCK_GROUP_RAID5: u64 = 1 << 7;
/// RAID6
pub const BTRFS_BLOCK_GROUP_RAID6: u64 = 1 << 8;

/// 需要条带化计算的 profile
pub const BTRFS_BLOCK_GROUP_STRIPED: u64 = BTRFS_BLOCK_GROUP_RAID0
    | BTRFS_BLOCK_GROUP_RAID10
    | BTRFS_BLOCK_GROUP_RAID5
    | BTRFS_BLOCK_GROUP_RAID6;

/// chunk item 固定部分大小
pub const BTRFS_CHUNK_ITEM_SIZE: usize = 48;

/// superblock 中 dev_item 的偏移
pub const BTRFS_SUPER_DEV_ITEM_OFFSET: usize = 0xc9;

/// 每个 stripe 描述大小
pub const BTRFS_STRIPE_SIZE: usize = 32;

//=============================================================================
// 其他结构大小
//=============================================================================

/// inode item 大小
pub const BTRFS_INODE_ITEM_SIZE: usize = 160;

/// root item 中 bytenr 的偏移（紧跟内嵌 inode item 之后）
pub const BTRFS_ROOT_ITEM_BYTENR_OFFSET: usize = 176;

/// root item 中 level 的偏移
pub const BTRFS_ROOT_ITEM_LEVEL_OFFSET: usize = 238;

/// 目录项头大小（location key + transid + data_len + name_len + type）
pub const BTRFS_DIR_ITEM_HEADER_SIZE: usize = 30;

/// 目录项文件类型：普通文件
pub const BTRFS_FT_REG_FILE: u8 = 1;
/// 目录项文件类型：目录
pub const BTRFS_FT_DIR: u8 = 2;

/// 默认子卷目录项名
pub const BTRFS_DEFAULT_SUBVOL_NAME: &str = "default";

//=============================================================================
// 校验和类型（superblock csum_type）
//=============================================================================

/// CRC32C
pub const BTRFS_CSUM_TYPE_CRC32: u16 = 0;
/// XXHASH64
pub const BTRFS_CSUM_TYPE_XXHASH: u16 = 1;
/// SHA-256
pub const BTRFS_CSUM_TYPE_SHA256: u16 = 2;
/// BLAKE2b-256
pub const BTRFS_CSUM_TYPE_BLAKE2: u16 = 3;
/// HMAC-SHA256（认证校验和）
pub const BTRFS_CSUM_TYPE_HMAC_SHA256: u16 = 4;
