//! 树读取器
//!
//! 对外部存储引擎只要求一件事：按逻辑地址读出一个节点（[`NodeSource`]）。
//! 查找、前进、跨叶子移动都在这里完成。

use super::{
    arena::{NodeArena, NodeId},
    cursor::{IndexCursor, PathSlot},
    node::Node,
};
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Key, TreeRoot},
};
use alloc::vec::Vec;
use core::cell::{Cell, Ref, RefCell, RefMut};

/// 节点来源（存储引擎）
pub trait NodeSource {
    /// 读取逻辑地址 `bytenr` 处的完整节点
    fn read_node(&mut self, bytenr: u64) -> Result<Vec<u8>>;
}

/// 遍历统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// 从根开始的查找次数
    pub searches: u64,
    /// 游标前进次数
    pub advances: u64,
    /// 前进/后退时跨越叶子的次数
    pub leaf_crossings: u64,
    /// 从节点来源读取并解码的节点数
    pub node_loads: u64,
}

/// 树读取器
///
/// 单线程使用；游标借用读取器，节点表和来源通过 `RefCell` 共享。
pub struct TreeReader<S: NodeSource> {
    source: RefCell<S>,
    arena: RefCell<NodeArena>,
    stats: Cell<TreeStats>,
}

impl<S: NodeSource> TreeReader<S> {
    /// 创建读取器
    pub fn new(source: S) -> Self {
        Self {
            source: RefCell::new(source),
            arena: RefCell::new(NodeArena::default()),
            stats: Cell::new(TreeStats::default()),
        }
    }

    /// 访问节点来源
    pub fn source(&self) -> Ref<'_, S> {
        self.source.borrow()
    }

    /// 可变访问节点来源（不能跨越游标操作持有）
    pub fn source_mut(&self) -> RefMut<'_, S> {
        self.source.borrow_mut()
    }

    /// 取回节点来源
    pub fn into_source(self) -> S {
        self.source.into_inner()
    }

    /// 遍历统计
    pub fn stats(&self) -> TreeStats {
        self.stats.get()
    }

    /// 当前被游标引用的节点数；没有存活游标时为 0
    pub fn live_nodes(&self) -> usize {
        self.arena.borrow().live()
    }

    pub(super) fn bump(&self, f: impl FnOnce(&mut TreeStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// 引用一个节点，必要时从来源读取；检查层级是否符合预期
    pub(super) fn pin(&self, bytenr: u64, level: u8) -> Result<NodeId> {
        let cached = self.arena.borrow().lookup(bytenr);
        if let Some(id) = cached {
            let found = self.with_node(id, |n| n.level())?;
            if found != level {
                return Err(level_mismatch(bytenr, level, found));
            }
            self.arena.borrow_mut().pin(id);
            return Ok(id);
        }

        let buf = self.source.borrow_mut().read_node(bytenr)?;
        let node = Node::decode(&buf, bytenr)?;
        if node.level() != level {
            return Err(level_mismatch(bytenr, level, node.level()));
        }

        self.bump(|s| s.node_loads += 1);
        Ok(self.arena.borrow_mut().insert(bytenr, node))
    }

    pub(super) fn unpin(&self, id: NodeId) {
        self.arena.borrow_mut().unpin(id);
    }

    pub(super) fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> Result<R> {
        let arena = self.arena.borrow();
        arena
            .get(id)
            .map(f)
            .ok_or(Error::new(ErrorKind::InvalidData, "stale tree node reference"))
    }

    /// floor 查找：定位到 key ≤ `key` 的最大记录
    ///
    /// 精确 key 不存在时回退一格，返回数值上紧邻的前一条记录（可能在左侧叶子中）；
    /// 整棵树都没有 ≤ `key` 的记录时返回 `NotFound`。
    /// 出错时已引用的节点随游标一起释放。
    pub fn floor_search(&self, root: TreeRoot, key: &Key) -> Result<IndexCursor<'_, S>> {
        self.bump(|s| s.searches += 1);

        let mut cursor = IndexCursor::new(self);
        let mut bytenr = root.bytenr;
        let mut level = root.level;

        loop {
            let id = self.pin(bytenr, level)?;
            cursor.push(PathSlot { node: id, slot: 0 });
            let slot = self.with_node(id, |n| n.floor_slot(key))?;

            if level == 0 {
                match slot {
                    Some(slot) => {
                        cursor.set_leaf_slot(slot);
                        return Ok(cursor);
                    }
                    None => {
                        // key 小于本叶子的第一条记录，前一条在左侧叶子
                        if cursor.step_back()? {
                            return Ok(cursor);
                        }
                        log::trace!("[TREE] floor search {:?}: no key at or before", key);
                        return Err(Error::new(ErrorKind::NotFound, "no index key at or before search key"));
                    }
                }
            }

            // key 小于子树所有 key 时沿最左分支下降
            let slot = slot.unwrap_or(0);
            cursor.set_slot_at_top(slot);
            bytenr = self
                .with_node(id, |n| n.child_at(slot))?
                .ok_or(Error::new(ErrorKind::InvalidData, "internal node slot without child"))?;
            level -= 1;
        }
    }

    /// 定位到树的第一条记录；空树返回 `NotFound`
    pub fn first(&self, root: TreeRoot) -> Result<IndexCursor<'_, S>> {
        self.bump(|s| s.searches += 1);

        let mut cursor = IndexCursor::new(self);
        let mut bytenr = root.bytenr;
        let mut level = root.level;

        loop {
            let id = self.pin(bytenr, level)?;
            cursor.push(PathSlot { node: id, slot: 0 });
            if level == 0 {
                if self.with_node(id, |n| n.nritems())? == 0 {
                    return Err(Error::new(ErrorKind::NotFound, "index is empty"));
                }
                return Ok(cursor);
            }
            bytenr = self
                .with_node(id, |n| n.child_at(0))?
                .ok_or(Error::new(ErrorKind::InvalidData, "internal node without children"))?;
            level -= 1;
        }
    }
}

fn level_mismatch(bytenr: u64, expected: u8, found: u8) -> Error {
    log::error!(
        "[TREE] node {:#x} level mismatch: expected={} found={}",
        bytenr,
        expected,
        found
    );
    Error::new(ErrorKind::InvalidData, "tree node level mismatch")
}
