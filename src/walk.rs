//! Tree-visiting drivers over a parsed [`Stn`].

use crate::tree::Stn;

/// Depth-first pre-order: visit a node, then (if the visitor returned
/// `true`) its children left to right. Returning `false` prunes the
/// subtree rooted at that node — its children are never visited.
pub fn pre_walk(node: &Stn, visit: &mut impl FnMut(&Stn) -> bool) {
    if visit(node) {
        for child in node.sons() {
            pre_walk(child, visit);
        }
    }
}

/// Descends into the first child before visiting the node itself, then
/// visits the remaining children — the standard order for a binary-like
/// tree of operator nodes (e.g. the output of [`Left`][crate::arena::ParserKind::Left]/
/// [`Right`][crate::arena::ParserKind::Right]), generalized to n-ary nodes.
/// As with [`pre_walk`], a `false` return skips the remaining children.
pub fn in_walk(node: &Stn, visit: &mut impl FnMut(&Stn) -> bool) {
    let sons = node.sons();
    if let Some(first) = sons.first() {
        in_walk(first, visit);
    }
    if visit(node) {
        for child in sons.iter().skip(1) {
            in_walk(child, visit);
        }
    }
}

/// Depth-first post-order: visit every child before the node itself.
pub fn post_walk(node: &Stn, visit: &mut impl FnMut(&Stn)) {
    for child in node.sons() {
        post_walk(child, visit);
    }
    visit(node);
}
