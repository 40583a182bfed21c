//! Document outline (bookmarks).
//!
//! Bookmarks live in an arena rooted at an invisible node. When the outline
//! is written, nodes are numbered breadth-first from the root: the node at
//! BFS position `i` (root excluded) becomes object `outline + 1 + i`, so all
//! `/Parent`, `/Prev`, `/Next`, `/First` and `/Last` links are known before
//! anything is emitted.
//!
//! ```ignore
//! use pdf_forge::writer::{BookmarkTarget, BookmarkTree};
//!
//! let mut tree = BookmarkTree::new();
//! let ch1 = tree.add(BookmarkTree::ROOT, "Chapter 1", BookmarkTarget::Page(0));
//! tree.add(ch1, "Section 1.1", BookmarkTarget::Named("s11".into()));
//! tree.add(BookmarkTree::ROOT, "Chapter 2", BookmarkTarget::Page(3));
//! ```

use crate::object::{array, Dict, Token};
use std::collections::VecDeque;

/// Handle to a node of a [`BookmarkTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookmarkId(usize);

/// Where a bookmark leads.
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkTarget {
    /// A named destination registered on some page
    Named(String),
    /// The top of a page (0-based index)
    Page(usize),
    /// An external URI
    Uri(String),
    /// No action (a pure grouping entry)
    None,
}

/// Text style for outline items.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutlineStyle {
    /// Display in italic
    pub italic: bool,
    /// Display in bold
    pub bold: bool,
    /// Text color (RGB, 0.0-1.0)
    pub color: Option<(f64, f64, f64)>,
}

impl OutlineStyle {
    /// `/F` flags value.
    pub fn flags(&self) -> i64 {
        let mut flags = 0i64;
        if self.italic {
            flags |= 1;
        }
        if self.bold {
            flags |= 2;
        }
        flags
    }
}

/// One bookmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkNode {
    /// Display title
    pub title: String,
    /// Target when clicked
    pub target: BookmarkTarget,
    /// Display style
    pub style: OutlineStyle,
    /// Whether children are shown expanded
    pub open: bool,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed bookmark tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkTree {
    nodes: Vec<BookmarkNode>,
}

impl Default for BookmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkTree {
    /// The invisible root.
    pub const ROOT: BookmarkId = BookmarkId(0);

    /// Create a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![BookmarkNode {
                title: String::new(),
                target: BookmarkTarget::None,
                style: OutlineStyle::default(),
                open: true,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Append a child to `parent`; it starts expanded.
    ///
    /// # Panics
    ///
    /// If `parent` does not belong to this tree.
    pub fn add(&mut self, parent: BookmarkId, title: impl Into<String>, target: BookmarkTarget) -> BookmarkId {
        let id = self.nodes.len();
        self.nodes.push(BookmarkNode {
            title: title.into(),
            target,
            style: OutlineStyle::default(),
            open: true,
            parent: Some(parent.0),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        BookmarkId(id)
    }

    /// Access a node.
    pub fn node(&self, id: BookmarkId) -> Option<&BookmarkNode> {
        self.nodes.get(id.0)
    }

    /// Mutable access to a node.
    pub fn node_mut(&mut self, id: BookmarkId) -> Option<&mut BookmarkNode> {
        self.nodes.get_mut(id.0)
    }

    /// Children of a node, in order.
    pub fn children(&self, id: BookmarkId) -> Vec<BookmarkId> {
        self.nodes
            .get(id.0)
            .map(|n| n.children.iter().copied().map(BookmarkId).collect())
            .unwrap_or_default()
    }

    /// Parent of a node (`None` for the root).
    pub fn parent(&self, id: BookmarkId) -> Option<BookmarkId> {
        self.nodes.get(id.0).and_then(|n| n.parent).map(BookmarkId)
    }

    /// Number of bookmarks, root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Nodes in breadth-first order from the root, root excluded.
    pub fn bfs_order(&self) -> Vec<BookmarkId> {
        let mut order = Vec::with_capacity(self.len());
        let mut queue: VecDeque<usize> = self.nodes[0].children.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            order.push(BookmarkId(index));
            queue.extend(self.nodes[index].children.iter().copied());
        }
        order
    }

    /// Total number of descendants of a node.
    pub fn descendant_count(&self, id: BookmarkId) -> usize {
        self.nodes
            .get(id.0)
            .map(|n| n.children.iter().map(|&c| 1 + self.descendant_count(BookmarkId(c))).sum())
            .unwrap_or(0)
    }

    /// `/Count` value of a node: its descendant count, negative when closed.
    pub fn count(&self, id: BookmarkId) -> i64 {
        let count = self.descendant_count(id) as i64;
        match self.node(id) {
            Some(node) if !node.open && id != Self::ROOT => -count,
            _ => count,
        }
    }

    /// Encode the outline dictionary followed by every node in BFS order.
    ///
    /// `outline_id` is the object number of the outline dictionary; the
    /// returned vector is meant to be emitted as objects `outline_id..`.
    /// `resolve` maps a destination name to its explicit destination.
    pub fn encode(
        &self,
        outline_id: u32,
        page_refs: &[u32],
        resolve: &dyn Fn(&str) -> Option<Vec<Token>>,
    ) -> Vec<Dict> {
        let order = self.bfs_order();
        let mut object_ids = vec![0u32; self.nodes.len()];
        object_ids[0] = outline_id;
        for (position, id) in order.iter().enumerate() {
            object_ids[id.0] = outline_id + 1 + position as u32;
        }
        let link = |index: usize| Token::reference(object_ids[index]);

        let root = &self.nodes[0];
        let mut outline = Dict::typed("Outlines");
        if let (Some(&first), Some(&last)) = (root.children.first(), root.children.last()) {
            outline.insert("First", link(first));
            outline.insert("Last", link(last));
            outline.insert("Count", Token::int(self.count(Self::ROOT)));
        }

        let mut objects = Vec::with_capacity(order.len() + 1);
        objects.push(outline);
        for id in order {
            let node = &self.nodes[id.0];
            let parent = node.parent.unwrap_or(0);
            let siblings = &self.nodes[parent].children;
            let position = siblings.iter().position(|&s| s == id.0).unwrap_or(0);

            let mut dict = Dict::new()
                .with("Title", Token::text(&node.title))
                .with("Parent", link(parent));
            if position > 0 {
                dict.insert("Prev", link(siblings[position - 1]));
            }
            if let Some(&next) = siblings.get(position + 1) {
                dict.insert("Next", link(next));
            }
            if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
                dict.insert("First", link(first));
                dict.insert("Last", link(last));
                dict.insert("Count", Token::int(self.count(id)));
            }
            match &node.target {
                BookmarkTarget::Named(name) => match resolve(name) {
                    Some(dest) => dict.insert("Dest", dest),
                    None => log::warn!("Bookmark '{}' points at unknown destination '{}'", node.title, name),
                },
                BookmarkTarget::Page(index) => match page_refs.get(*index) {
                    Some(&page) => dict.insert("Dest", array([Token::reference(page), Token::name("Fit")])),
                    None => log::warn!("Bookmark '{}' points past the last page", node.title),
                },
                BookmarkTarget::Uri(uri) => {
                    let action = Dict::new()
                        .with("S", Token::name("URI"))
                        .with("URI", Token::bytes(uri.as_bytes()));
                    dict.insert("A", action);
                },
                BookmarkTarget::None => {},
            }
            let flags = node.style.flags();
            if flags != 0 {
                dict.insert("F", Token::int(flags));
            }
            if let Some((r, g, b)) = node.style.color {
                dict.insert("C", array([Token::real(r), Token::real(g), Token::real(b)]));
            }
            objects.push(dict);
        }
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_dests(_: &str) -> Option<Vec<Token>> {
        None
    }

    fn sample() -> (BookmarkTree, BookmarkId, BookmarkId, BookmarkId) {
        let mut tree = BookmarkTree::new();
        let a = tree.add(BookmarkTree::ROOT, "A", BookmarkTarget::Page(0));
        let b = tree.add(BookmarkTree::ROOT, "B", BookmarkTarget::Page(1));
        let a1 = tree.add(a, "A.1", BookmarkTarget::None);
        tree.add(a, "A.2", BookmarkTarget::None);
        tree.add(a1, "A.1.a", BookmarkTarget::None);
        (tree, a, b, a1)
    }

    #[test]
    fn test_empty_tree() {
        let tree = BookmarkTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(tree.bfs_order().is_empty());
    }

    #[test]
    fn test_bfs_order() {
        let (tree, a, b, a1) = sample();
        let order = tree.bfs_order();
        assert_eq!(order[..3], [a, b, a1]);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_counts() {
        let (mut tree, a, b, a1) = sample();
        assert_eq!(tree.count(BookmarkTree::ROOT), 5);
        assert_eq!(tree.count(a), 3);
        assert_eq!(tree.count(a1), 1);
        assert_eq!(tree.count(b), 0);
        tree.node_mut(a).unwrap().open = false;
        assert_eq!(tree.count(a), -3);
    }

    #[test]
    fn test_encode_links() {
        let (tree, _, _, _) = sample();
        let objects = tree.encode(10, &[3, 6], &no_dests);
        assert_eq!(objects.len(), 6);

        let outline = &objects[0];
        assert!(outline.is_type("Outlines"));
        assert_eq!(outline.get_ref("First").map(|r| r.id), Some(11));
        assert_eq!(outline.get_ref("Last").map(|r| r.id), Some(12));
        assert_eq!(outline.get_int("Count"), Some(5));

        // A = 11, B = 12, A.1 = 13, A.2 = 14, A.1.a = 15
        let a = &objects[1];
        assert_eq!(a.get_ref("Parent").map(|r| r.id), Some(10));
        assert_eq!(a.get_ref("Next").map(|r| r.id), Some(12));
        assert_eq!(a.get_ref("First").map(|r| r.id), Some(13));
        assert_eq!(a.get_ref("Last").map(|r| r.id), Some(14));
        assert_eq!(a.get_array("Dest").unwrap()[0], Token::reference(3));

        let a2 = &objects[4];
        assert_eq!(a2.get_ref("Prev").map(|r| r.id), Some(13));
        assert!(a2.get_ref("Next").is_none());
        assert!(!a2.contains_key("Count"));

        let leaf = &objects[5];
        assert_eq!(leaf.get_ref("Parent").map(|r| r.id), Some(13));
    }

    #[test]
    fn test_named_target_resolution() {
        let mut tree = BookmarkTree::new();
        tree.add(BookmarkTree::ROOT, "Known", BookmarkTarget::Named("k".into()));
        tree.add(BookmarkTree::ROOT, "Unknown", BookmarkTarget::Named("u".into()));
        let resolve = |name: &str| (name == "k").then(|| array([Token::reference(3), Token::name("XYZ")]));
        let objects = tree.encode(20, &[3], &resolve);
        assert!(objects[1].contains_key("Dest"));
        assert!(!objects[2].contains_key("Dest"));
    }

    #[test]
    fn test_style_entries() {
        let mut tree = BookmarkTree::new();
        let id = tree.add(BookmarkTree::ROOT, "Styled", BookmarkTarget::Uri("https://example.com".into()));
        tree.node_mut(id).unwrap().style = OutlineStyle {
            italic: true,
            bold: true,
            color: Some((1.0, 0.0, 0.0)),
        };
        let objects = tree.encode(1, &[], &no_dests);
        assert_eq!(objects[1].get_int("F"), Some(3));
        assert!(objects[1].contains_key("C"));
        assert!(objects[1].get_dict("A").is_some());
    }
}
