//! 单个目录内的名字查找

use crate::{
    consts::*,
    crypto::crc::name_hash,
    error::{Error, ErrorKind, Result},
    tree::{NodeSource, TreeReader},
    types::{DirEntry, InodeItem, Key, TreeRoot},
};

/// 在目录 `dir` 中查找名字
///
/// DIR_ITEM 的 key offset 是名字哈希；哈希冲突的多个目录项打包在同一个 item 里。
pub fn lookup_name<S: NodeSource>(
    reader: &TreeReader<S>,
    tree: TreeRoot,
    dir: u64,
    name: &[u8],
) -> Result<DirEntry> {
    let key = Key::new(dir, BTRFS_DIR_ITEM_KEY, name_hash(name));
    let item = match reader.floor_search(tree, &key) {
        Ok(cursor) => cursor.item()?,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let found = match item {
        Some(item) if item.key == key => DirEntry::decode_all(&item.data)?
            .into_iter()
            .find(|e| e.name == name),
        _ => None,
    };

    found.ok_or_else(|| {
        log::debug!(
            "[DIR] {:?} not found in dir {}",
            alloc::string::String::from_utf8_lossy(name),
            dir
        );
        Error::new(ErrorKind::NotFound, "path component not found")
    })
}

/// 读取 inode 元数据
pub fn read_inode<S: NodeSource>(reader: &TreeReader<S>, tree: TreeRoot, ino: u64) -> Result<InodeItem> {
    let key = Key::new(ino, BTRFS_INODE_ITEM_KEY, 0);
    let item = match reader.floor_search(tree, &key) {
        Ok(cursor) => cursor.item()?,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    match item {
        Some(item) if item.key == key => InodeItem::decode(&item.data),
        _ => {
            log::error!("[DIR] inode {} has no INODE_ITEM", ino);
            Err(Error::new(ErrorKind::NotFound, "inode item not found"))
        }
    }
}
