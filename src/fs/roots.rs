//! root tree 查找：树根描述与默认子卷

use crate::{
    consts::*,
    crypto::crc::name_hash,
    error::{Error, ErrorKind, Result},
    tree::{NodeSource, TreeReader},
    types::{DirEntry, Key, RootItem, TreeRoot},
};

/// 读取 `id` 的树根描述（最新生成号）
///
/// ROOT_ITEM 的 key offset 是快照生成号，查找 `(id, ROOT_ITEM, u64::MAX)` 的 floor
/// 即得到最新的一条。
pub fn read_root<S: NodeSource>(reader: &TreeReader<S>, root_tree: TreeRoot, id: u64) -> Result<RootItem> {
    let search_key = Key::new(id, BTRFS_ROOT_ITEM_KEY, u64::MAX);
    let cursor = match reader.floor_search(root_tree, &search_key) {
        Ok(cursor) => cursor,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::error!("[ROOT] no ROOT_ITEM for tree {}", id);
            return Err(Error::new(ErrorKind::NotFound, "root item not found"));
        }
        Err(e) => return Err(e),
    };

    let item = cursor
        .item()?
        .ok_or(Error::new(ErrorKind::NotFound, "root item not found"))?;
    if item.key.objectid != id || item.key.item_type != BTRFS_ROOT_ITEM_KEY {
        log::error!("[ROOT] no ROOT_ITEM for tree {} (floor landed on {:?})", id, item.key);
        return Err(Error::new(ErrorKind::NotFound, "root item not found"));
    }

    let root = RootItem::decode(&item.data)?;
    log::debug!(
        "[ROOT] tree {} root={:#x} level={} generation={}",
        id,
        root.root.bytenr,
        root.root.level,
        root.generation
    );
    Ok(root)
}

/// 默认子卷：root tree 目录 `root_dir_objectid` 中的 "default" 目录项，
/// 不存在时为顶层子卷（FS_TREE）
pub fn default_subvolume<S: NodeSource>(
    reader: &TreeReader<S>,
    root_tree: TreeRoot,
    root_dir_objectid: u64,
) -> Result<u64> {
    let name = BTRFS_DEFAULT_SUBVOL_NAME.as_bytes();
    let key = Key::new(root_dir_objectid, BTRFS_DIR_ITEM_KEY, name_hash(name));

    let item = match reader.floor_search(root_tree, &key) {
        Ok(cursor) => cursor.item()?,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let entry = match item {
        Some(item) if item.key == key => DirEntry::decode_all(&item.data)?
            .into_iter()
            .find(|e| e.name == name),
        _ => None,
    };

    match entry {
        Some(e) if e.location.item_type == BTRFS_ROOT_ITEM_KEY => {
            log::info!("[ROOT] default subvolume {}", e.location.objectid);
            Ok(e.location.objectid)
        }
        Some(e) => {
            log::error!("[ROOT] default entry points at {:?}", e.location);
            Err(Error::new(ErrorKind::InvalidData, "default subvolume entry is not a root"))
        }
        None => Ok(BTRFS_FS_TREE_OBJECTID),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dir_entry, mem_tree, root_item};
    use alloc::vec;

    fn root_entry(id: u64, gen_offset: u64, bytenr: u64) -> (Key, alloc::vec::Vec<u8>) {
        (
            Key::new(id, BTRFS_ROOT_ITEM_KEY, gen_offset),
            root_item(TreeRoot { bytenr, level: 0 }, 256),
        )
    }

    #[test]
    fn test_read_root_latest_generation() {
        let (nodes, root) = mem_tree(
            2,
            vec![
                root_entry(5, 0, 0x1000),
                root_entry(256, 0, 0x2000),
                root_entry(256, 40, 0x3000),
                root_entry(257, 0, 0x4000),
            ],
        );
        let reader = TreeReader::new(nodes);

        assert_eq!(read_root(&reader, root, 256).unwrap().root.bytenr, 0x3000);
        assert_eq!(read_root(&reader, root, 5).unwrap().root.bytenr, 0x1000);
        assert_eq!(read_root(&reader, root, 300).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(read_root(&reader, root, 1).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(reader.live_nodes(), 0);
    }

    #[test]
    fn test_default_subvolume() {
        let (nodes, root) = mem_tree(2, vec![root_entry(5, 0, 0x1000)]);
        let reader = TreeReader::new(nodes);
        assert_eq!(default_subvolume(&reader, root, 6).unwrap(), 5);

        let name = BTRFS_DEFAULT_SUBVOL_NAME.as_bytes();
        let key = Key::new(6, BTRFS_DIR_ITEM_KEY, name_hash(name));
        let (nodes, root) = mem_tree(
            2,
            vec![
                root_entry(5, 0, 0x1000),
                (key, dir_entry(Key::new(258, BTRFS_ROOT_ITEM_KEY, u64::MAX), 2, name)),
            ],
        );
        let reader = TreeReader::new(nodes);
        assert_eq!(default_subvolume(&reader, root, 6).unwrap(), 258);
    }
}
