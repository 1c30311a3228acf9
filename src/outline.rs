//! Document outline (bookmarks). Entries are collected flat, in insertion
//! order, with a nesting level; the sibling/parent links the PDF outline
//! dictionary needs are derived here in one pass.

use crate::types::Pt;

/// One outline entry. `y` is the destination height in PDF page space
/// (measured from the bottom edge).
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub title: String,
    pub level: usize,
    pub(crate) page_index: usize,
    pub(crate) y: Pt,
}

/// Link fields of one outline item, as indices into the bookmark list.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct OutlineNode {
    pub parent: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub first: Option<usize>,
    pub last: Option<usize>,
    /// Number of descendants, all kept open.
    pub count: usize,
}

/// Derive the tree links. A level deeper than `previous + 1` is clamped, so
/// a skipped level cannot orphan an entry.
pub(crate) fn link(bookmarks: &[Bookmark]) -> Vec<OutlineNode> {
    let mut nodes = vec![OutlineNode::default(); bookmarks.len()];
    // ancestors[l] is the index of the current chain entry at level l.
    let mut ancestors: Vec<usize> = Vec::new();
    let mut last_sibling: Vec<Option<usize>> = Vec::new();

    for (i, bookmark) in bookmarks.iter().enumerate() {
        let level = bookmark.level.min(ancestors.len());
        ancestors.truncate(level);
        last_sibling.truncate(level + 1);
        last_sibling.resize(level + 1, None);

        let parent = ancestors.last().copied();
        nodes[i].parent = parent;
        if let Some(prev) = last_sibling[level] {
            nodes[i].prev = Some(prev);
            nodes[prev].next = Some(i);
        }
        last_sibling[level] = Some(i);

        if let Some(p) = parent {
            if nodes[p].first.is_none() {
                nodes[p].first = Some(i);
            }
            nodes[p].last = Some(i);
        }
        for &ancestor in &ancestors {
            nodes[ancestor].count += 1;
        }
        ancestors.push(i);
    }
    nodes
}
