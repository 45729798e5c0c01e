//! The syntax tree produced by a parse.

use crate::position::Position;

/// A node in the syntax tree: a position, an optional label, and an ordered
/// list of owned children.
///
/// A node is reachable from at most one parent at a time: [`Stn::merge`] and
/// [`Stn::unlink`] transfer ownership of children rather than sharing them,
/// so a successful parse hands the caller exactly one root it owns outright.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stn {
    pub(crate) where_: Position,
    pub(crate) data: String,
    pub(crate) children: Vec<Stn>,
}

impl Stn {
    /// A leaf node: no children, carrying `data`.
    pub fn leaf(where_: Position, data: impl Into<String>) -> Self {
        Stn {
            where_,
            data: data.into(),
            children: Vec::new(),
        }
    }

    /// A dataless aggregation node, the kind produced mid-parse by
    /// `Sequence`/`Repeat` before the collapse rule runs.
    pub fn aggregate(where_: Position) -> Self {
        Stn {
            where_,
            data: String::new(),
            children: Vec::new(),
        }
    }

    pub fn where_(&self) -> Position {
        self.where_
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn set_data(&mut self, data: impl Into<String>) {
        self.data = data.into();
    }

    pub fn set_where(&mut self, where_: Position) {
        self.where_ = where_;
    }

    /// `true` if this node carries a non-empty label.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// `true` if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn sons(&self) -> &[Stn] {
        &self.children
    }

    pub fn sons_mut(&mut self) -> &mut Vec<Stn> {
        &mut self.children
    }

    pub fn son(&self, i: usize) -> &Stn {
        &self.children[i]
    }

    pub fn add_son(&mut self, son: Stn) {
        self.children.push(son);
    }

    /// Remove and return the child at `index`, shifting later children down.
    pub fn unlink(&mut self, index: usize) -> Stn {
        self.children.remove(index)
    }

    /// Remove and return every child, leaving this node childless.
    pub fn unlink_all(&mut self) -> Vec<Stn> {
        std::mem::take(&mut self.children)
    }

    /// Splice the children of `source` into `self` at `index`, transferring
    /// ownership and leaving `source` childless.
    pub fn merge(&mut self, source: &mut Stn, index: usize) {
        let drained = source.unlink_all();
        let tail = self.children.split_off(index);
        self.children.extend(drained);
        self.children.extend(tail);
    }

    /// 1-based index resolution used by `Root`/`Flat`/etc: negative counts
    /// from the end, `0` is out of range (callers treat that as "no-op").
    pub(crate) fn resolve_index(len: usize, idx: isize) -> Option<usize> {
        if idx == 0 {
            return None;
        }
        let i = if idx > 0 {
            idx as usize - 1
        } else {
            len.checked_sub((-idx) as usize)?
        };
        (i < len).then_some(i)
    }
}
