//! Outline numbering and counts on generated trees.

use pdf_forge::document::PdfReader;
use pdf_forge::object::{Dict, Token};
use pdf_forge::writer::{BookmarkId, BookmarkTarget, BookmarkTree, Page, PdfWriter, WriterConfig};
use proptest::prelude::*;

fn no_dests(_: &str) -> Option<Vec<Token>> {
    None
}

/// Tree where node `i` hangs under `parents[i] % (i + 1)` (0 being the root).
fn build_tree(parents: &[usize], closed: &[bool]) -> (BookmarkTree, Vec<BookmarkId>) {
    let mut tree = BookmarkTree::new();
    let mut ids = vec![BookmarkTree::ROOT];
    for (i, parent) in parents.iter().enumerate() {
        let parent = ids[parent % (i + 1)];
        let id = tree.add(parent, format!("Item {}", i), BookmarkTarget::None);
        if closed.get(i).copied().unwrap_or(false) {
            tree.node_mut(id).unwrap().open = false;
        }
        ids.push(id);
    }
    (tree, ids)
}

fn count_of(dict: &Dict) -> i64 {
    dict.get_int("Count").unwrap_or(0)
}

proptest! {
    #[test]
    fn prop_counts_and_numbering(
        parents in proptest::collection::vec(0usize..64, 1..40),
        closed in proptest::collection::vec(any::<bool>(), 0..40),
    ) {
        let (tree, _) = build_tree(&parents, &closed);
        let outline_id = 100u32;
        let objects = tree.encode(outline_id, &[], &no_dests);
        prop_assert_eq!(objects.len(), parents.len() + 1);

        // The root count is the whole tree, always positive
        let root_count = count_of(&objects[0]);
        prop_assert_eq!(root_count, parents.len() as i64);

        // Top-level items account for themselves plus their visible-or-not descendants
        let mut top_level = 0i64;
        for (position, dict) in objects.iter().enumerate().skip(1) {
            let id = outline_id + position as u32;
            let parent = dict.get_ref("Parent").unwrap().id;
            prop_assert!(parent < id);
            if parent == outline_id {
                top_level += 1 + count_of(dict).abs();
            }
            for key in ["First", "Last", "Next"] {
                if let Some(r) = dict.get_ref(key) {
                    prop_assert!(r.id > id);
                }
            }
            if let Some(prev) = dict.get_ref("Prev") {
                prop_assert!(prev.id < id);
            }
        }
        prop_assert_eq!(top_level, root_count);
    }
}

#[test]
fn test_closed_nodes_have_negative_counts() {
    let (tree, ids) = build_tree(&[0, 1, 1, 2], &[true, false, false, false]);
    // Item 0 is closed with three descendants
    assert_eq!(tree.count(ids[1]), -3);
    assert_eq!(tree.count(BookmarkTree::ROOT), 4);
    let objects = tree.encode(10, &[], &no_dests);
    assert_eq!(count_of(&objects[0]), 4);
    assert_eq!(count_of(&objects[1]), -3);
}

#[test]
fn test_outline_reads_back_in_document_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut writer = PdfWriter::new(WriterConfig::default());
    writer.add_page(Page::letter()).unwrap();
    writer.add_page(Page::letter()).unwrap();
    let mut tree = BookmarkTree::new();
    let one = tree.add(BookmarkTree::ROOT, "One", BookmarkTarget::Page(0));
    tree.add(one, "One.A", BookmarkTarget::Page(1));
    tree.add(BookmarkTree::ROOT, "Two", BookmarkTarget::Uri("https://example.org".into()));
    writer.set_bookmarks(tree).unwrap();
    let pdf = writer.finish(Vec::new()).unwrap();

    let registry = PdfReader::from_bytes(&pdf).unwrap();
    let catalog = registry.root().and_then(|r| registry.get(r.id)).unwrap();
    assert_eq!(catalog.dict.get_name("PageMode"), Some("UseOutlines"));
    let outline = registry.get(catalog.dict.get_ref("Outlines").unwrap().id).unwrap();
    assert_eq!(outline.dict.get_int("Count"), Some(3));

    let mut titles = Vec::new();
    let mut current = outline.dict.get_ref("First");
    while let Some(r) = current {
        let item = &registry.get(r.id).unwrap().dict;
        titles.push(item.get_token("Title").cloned().unwrap());
        current = item.get_ref("Next");
    }
    assert_eq!(
        titles,
        vec![
            Token::LiteralString(b"One".to_vec()),
            Token::LiteralString(b"Two".to_vec())
        ]
    );

    let pages = registry.pages();
    let first = registry.get(outline.dict.get_ref("First").unwrap().id).unwrap();
    let dest = first.dict.get_array("Dest").unwrap();
    assert_eq!(dest[0], Token::reference(pages[0]));
    assert_eq!(dest[1], Token::name("Fit"));
}
