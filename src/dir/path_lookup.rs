//! 路径解析
//!
//! 把文件系统内的路径解析为 `(子卷, inode, 大小)`。路径相对于默认子卷的根目录，
//! 开头的 `/`、空组件和 `.` 被忽略。目录项指向 ROOT_ITEM 时进入另一个子卷，
//! 从它的根目录继续。

use super::lookup::{lookup_name, read_inode};
use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::{read_root, FileTarget},
    tree::{NodeSource, TreeReader},
    types::TreeRoot,
};

/// 路径解析接口
pub trait PathResolver {
    /// 把路径解析为目标文件
    fn resolve(&self, path: &str) -> Result<FileTarget>;
}

/// 基于树遍历的路径解析器
pub struct TreePathResolver<'r, S: NodeSource> {
    reader: &'r TreeReader<S>,
    root_tree: TreeRoot,
    default_subvol: u64,
}

/// 当前所在子卷
struct SubvolPos {
    id: u64,
    tree: TreeRoot,
}

impl<'r, S: NodeSource> TreePathResolver<'r, S> {
    /// 创建解析器
    ///
    /// # 参数
    ///
    /// * `reader` - 树读取器
    /// * `root_tree` - root tree 根
    /// * `default_subvol` - 路径起点所在子卷
    pub fn new(reader: &'r TreeReader<S>, root_tree: TreeRoot, default_subvol: u64) -> Self {
        Self {
            reader,
            root_tree,
            default_subvol,
        }
    }

    /// 进入子卷，返回子卷位置和根目录 inode
    fn enter_subvol(&self, id: u64) -> Result<(SubvolPos, u64)> {
        let root = read_root(self.reader, self.root_tree, id).map_err(|e| {
            log::error!("[PATH] subvolume {} root unreadable: {}", id, e);
            e.recategorize(ErrorKind::SubvolumeUnreadable)
        })?;
        Ok((SubvolPos { id, tree: root.root }, root.root_dirid))
    }
}

impl<S: NodeSource> PathResolver for TreePathResolver<'_, S> {
    fn resolve(&self, path: &str) -> Result<FileTarget> {
        if path.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty path"));
        }

        let (mut subvol, mut ino) = self.enter_subvol(self.default_subvol)?;
        let mut components = path.split('/').filter(|c| !c.is_empty() && *c != ".").peekable();

        while let Some(component) = components.next() {
            if component == ".." {
                log::error!("[PATH] '..' in {:?} is not supported", path);
                return Err(Error::new(ErrorKind::Unsupported, "'..' path components are not supported"));
            }

            let entry = lookup_name(self.reader, subvol.tree, ino, component.as_bytes())?;
            match entry.location.item_type {
                BTRFS_INODE_ITEM_KEY => ino = entry.location.objectid,
                BTRFS_ROOT_ITEM_KEY => {
                    log::debug!("[PATH] {:?} crosses into subvolume {}", component, entry.location.objectid);
                    (subvol, ino) = self.enter_subvol(entry.location.objectid)?;
                }
                other => {
                    log::error!("[PATH] {:?} has location type {}", component, other);
                    return Err(Error::new(ErrorKind::InvalidData, "unexpected dir entry location type"));
                }
            }

            if components.peek().is_some() && entry.file_type != BTRFS_FT_DIR {
                log::error!("[PATH] {:?} is not a directory", component);
                return Err(Error::new(ErrorKind::NotFound, "path component is not a directory"));
            }
        }

        let inode = read_inode(self.reader, subvol.tree, ino)?;
        if !inode.is_regular() {
            log::error!("[PATH] {:?} is not a regular file (mode {:o})", path, inode.mode);
            return Err(Error::new(ErrorKind::InvalidInput, "target is not a regular file"));
        }

        log::debug!(
            "[PATH] {:?} -> subvol {} inode {} size {}",
            path,
            subvol.id,
            ino,
            inode.size
        );
        Ok(FileTarget::new(subvol.id, ino, inode.size))
    }
}
