//! 节点表
//!
//! 遍历过程中使用的节点保存在一张按下标访问的表中，游标只记录
//! `(节点下标, 槽位)`，不持有节点指针。每个节点带引用计数（pin），
//! 计数归零时立即从表中移除，槽位回收复用。

use super::node::Node;
use alloc::{collections::BTreeMap, vec::Vec};

/// 节点表下标
pub type NodeId = usize;

struct ArenaSlot {
    bytenr: u64,
    node: Node,
    pins: u32,
}

/// 节点表
#[derive(Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<ArenaSlot>>,
    free: Vec<NodeId>,
    by_bytenr: BTreeMap<u64, NodeId>,
}

impl NodeArena {
    /// 按逻辑地址查找已在表中的节点
    pub(crate) fn lookup(&self, bytenr: u64) -> Option<NodeId> {
        self.by_bytenr.get(&bytenr).copied()
    }

    /// 增加已有节点的引用计数
    pub(crate) fn pin(&mut self, id: NodeId) {
        if let Some(Some(slot)) = self.slots.get_mut(id) {
            slot.pins += 1;
        }
    }

    /// 放入新节点，初始引用计数为 1
    pub(crate) fn insert(&mut self, bytenr: u64, node: Node) -> NodeId {
        let slot = ArenaSlot {
            bytenr,
            node,
            pins: 1,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.by_bytenr.insert(bytenr, id);
        id
    }

    /// 减少引用计数，归零时移除节点
    pub(crate) fn unpin(&mut self, id: NodeId) {
        let remove = match self.slots.get_mut(id) {
            Some(Some(slot)) => {
                slot.pins = slot.pins.saturating_sub(1);
                slot.pins == 0
            }
            _ => {
                log::warn!("[TREE] unpin of unknown node id {}", id);
                false
            }
        };

        if remove {
            if let Some(slot) = self.slots[id].take() {
                self.by_bytenr.remove(&slot.bytenr);
            }
            self.free.push(id);
        }
    }

    /// 访问节点
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id).and_then(|s| s.as_ref()).map(|s| &s.node)
    }

    /// 当前被引用的节点数
    pub(crate) fn live(&self) -> usize {
        self.by_bytenr.len()
    }
}
