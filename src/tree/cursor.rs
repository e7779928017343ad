//! 索引游标
//!
//! 游标是一条从根到叶子的路径，每层记录 `(节点表下标, 槽位)`。
//! 路径可以复制和检查；游标被丢弃时（正常结束、未找到、出错）
//! 释放路径上所有节点的引用。

use super::{
    arena::NodeId,
    node::Item,
    reader::{NodeSource, TreeReader},
};
use crate::{
    error::{Error, ErrorKind, Result},
    types::Key,
};
use alloc::vec::Vec;

/// 路径上一层的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSlot {
    /// 节点表下标
    pub node: NodeId,
    /// 节点内槽位
    pub slot: usize,
}

/// 索引游标
pub struct IndexCursor<'r, S: NodeSource> {
    reader: &'r TreeReader<S>,
    /// path[0] 为根，最后一项为叶子
    path: Vec<PathSlot>,
    exhausted: bool,
}

impl<'r, S: NodeSource> IndexCursor<'r, S> {
    pub(super) fn new(reader: &'r TreeReader<S>) -> Self {
        Self {
            reader,
            path: Vec::new(),
            exhausted: false,
        }
    }

    pub(super) fn push(&mut self, slot: PathSlot) {
        self.path.push(slot);
    }

    pub(super) fn set_slot_at_top(&mut self, slot: usize) {
        if let Some(last) = self.path.last_mut() {
            last.slot = slot;
        }
    }

    pub(super) fn set_leaf_slot(&mut self, slot: usize) {
        self.set_slot_at_top(slot);
    }

    /// 完整路径（根在前）
    pub fn path(&self) -> &[PathSlot] {
        &self.path
    }

    /// 当前叶子位置；越过最后一条记录后返回 `None`
    pub fn position(&self) -> Option<PathSlot> {
        if self.exhausted {
            None
        } else {
            self.path.last().copied()
        }
    }

    /// 当前记录的 key
    pub fn key(&self) -> Result<Option<Key>> {
        match self.position() {
            Some(pos) => self.reader.with_node(pos.node, |n| n.key_at(pos.slot)),
            None => Ok(None),
        }
    }

    /// 当前记录（key 与数据副本）
    pub fn item(&self) -> Result<Option<Item>> {
        match self.position() {
            Some(pos) => self
                .reader
                .with_node(pos.node, |n| n.item_at(pos.slot).cloned()),
            None => Ok(None),
        }
    }

    /// 前进到下一条记录，必要时进入下一个叶子
    ///
    /// 返回 `false` 表示索引已经走完。
    pub fn advance(&mut self) -> Result<bool> {
        if self.exhausted || self.path.is_empty() {
            return Ok(false);
        }
        self.reader.bump(|s| s.advances += 1);

        let depth = self.path.len();
        let leaf = self.path[depth - 1];
        let nritems = self.reader.with_node(leaf.node, |n| n.nritems())?;
        if leaf.slot + 1 < nritems {
            self.path[depth - 1].slot += 1;
            return Ok(true);
        }

        // 向上找到还有右兄弟的一层
        let mut level = depth - 1;
        loop {
            if level == 0 {
                self.exhausted = true;
                return Ok(false);
            }
            level -= 1;
            let pos = self.path[level];
            let nritems = self.reader.with_node(pos.node, |n| n.nritems())?;
            if pos.slot + 1 < nritems {
                self.path[level].slot += 1;
                break;
            }
        }

        // 沿最左分支下降到叶子
        self.descend_from(level, |_| 0)?;
        self.reader.bump(|s| s.leaf_crossings += 1);
        Ok(true)
    }

    /// 后退到前一条记录，必要时进入左侧叶子
    ///
    /// 返回 `false` 表示已经在第一条记录之前。
    pub(super) fn step_back(&mut self) -> Result<bool> {
        if self.path.is_empty() {
            return Ok(false);
        }

        let depth = self.path.len();
        if self.path[depth - 1].slot > 0 {
            self.path[depth - 1].slot -= 1;
            self.exhausted = false;
            return Ok(true);
        }

        let mut level = depth - 1;
        loop {
            if level == 0 {
                return Ok(false);
            }
            level -= 1;
            if self.path[level].slot > 0 {
                self.path[level].slot -= 1;
                break;
            }
        }

        // 沿最右分支下降到叶子
        self.descend_from(level, |nritems| nritems.saturating_sub(1))?;
        self.exhausted = false;
        self.reader.bump(|s| s.leaf_crossings += 1);

        let leaf = self.path[depth - 1];
        if self.reader.with_node(leaf.node, |n| n.nritems())? == 0 {
            return Err(Error::new(ErrorKind::InvalidData, "empty non-root leaf"));
        }
        Ok(true)
    }

    /// 从 `level` 层当前槽位开始，逐层替换下面的节点
    fn descend_from(&mut self, level: usize, pick: impl Fn(usize) -> usize) -> Result<()> {
        for i in level + 1..self.path.len() {
            let parent = self.path[i - 1];
            let (child, child_level) = self.reader.with_node(parent.node, |n| {
                (n.child_at(parent.slot), n.level().saturating_sub(1))
            })?;
            let child =
                child.ok_or(Error::new(ErrorKind::InvalidData, "internal node slot without child"))?;

            let id = self.reader.pin(child, child_level)?;
            let old = core::mem::replace(&mut self.path[i], PathSlot { node: id, slot: 0 });
            self.reader.unpin(old.node);

            let nritems = self.reader.with_node(id, |n| n.nritems())?;
            self.path[i].slot = pick(nritems);
        }
        Ok(())
    }

    /// 显式释放游标（与丢弃等价）
    pub fn release(self) {}
}

impl<S: NodeSource> Drop for IndexCursor<'_, S> {
    fn drop(&mut self) {
        for pos in self.path.drain(..) {
            self.reader.unpin(pos.node);
        }
    }
}
