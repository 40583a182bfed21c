//! Logical structure (tagged content) for accessible output.
//!
//! Each [`StructElement`] tags either a marked-content sequence on a page
//! (identified by its MCID) or one of the page's annotations. At write time
//! the elements become `/StructElem` objects under a synthetic `/Document`
//! node, with a number-tree parent tree mapping each page's
//! `/StructParents` key (the page index) and each tagged annotation's
//! `/StructParent` key (`page_count + k`) back to the elements.

use crate::error::{Error, Result};
use crate::object::{array, Dict, Token};
use std::collections::{HashMap, HashSet};

/// What a structure element points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructContent {
    /// Marked-content sequence `/Tag <</MCID n>> BDC ... EMC` in the page content
    MarkedContent(u32),
    /// Annotation by index on its page
    Annotation(usize),
}

/// One tagged span.
#[derive(Debug, Clone, PartialEq)]
pub struct StructElement {
    /// Structure type (`P`, `H1`, `Figure`, `Link`, ...)
    pub tag: String,
    /// 0-based page index
    pub page: usize,
    /// Tagged content
    pub content: StructContent,
    /// `/Lang`
    pub lang: Option<String>,
    /// `/Alt`
    pub alt: Option<String>,
    /// `/ActualText`
    pub actual_text: Option<String>,
}

impl StructElement {
    /// Tag a marked-content sequence.
    pub fn marked_content(tag: impl Into<String>, page: usize, mcid: u32) -> Self {
        Self::new(tag, page, StructContent::MarkedContent(mcid))
    }

    /// Tag an annotation.
    pub fn annotation(tag: impl Into<String>, page: usize, index: usize) -> Self {
        Self::new(tag, page, StructContent::Annotation(index))
    }

    fn new(tag: impl Into<String>, page: usize, content: StructContent) -> Self {
        Self {
            tag: tag.into(),
            page,
            content,
            lang: None,
            alt: None,
            actual_text: None,
        }
    }

    /// Set `/Lang`.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Set `/Alt`.
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    /// Set `/ActualText`.
    pub fn with_actual_text(mut self, text: impl Into<String>) -> Self {
        self.actual_text = Some(text.into());
        self
    }
}

/// Structure elements bound to the document's page layout.
#[derive(Debug)]
pub(crate) struct StructureTree<'a> {
    elements: &'a [StructElement],
    page_count: usize,
}

impl<'a> StructureTree<'a> {
    pub(crate) fn new(elements: &'a [StructElement], page_count: usize) -> Self {
        Self { elements, page_count }
    }

    /// Check that every element targets existing content exactly once.
    ///
    /// `annotation_counts[i]` is the number of annotations on page `i`.
    pub(crate) fn validate(&self, annotation_counts: &[usize]) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, element) in self.elements.iter().enumerate() {
            if element.page >= self.page_count {
                return Err(Error::InvalidDocument(format!(
                    "structure element {} ({}) names page {} of {}",
                    index, element.tag, element.page, self.page_count
                )));
            }
            if let StructContent::Annotation(a) = element.content {
                let available = annotation_counts.get(element.page).copied().unwrap_or(0);
                if a >= available {
                    return Err(Error::InvalidDocument(format!(
                        "structure element {} ({}) names annotation {} on page {}, which has {}",
                        index, element.tag, a, element.page, available
                    )));
                }
            }
            if !seen.insert((element.page, element.content)) {
                return Err(Error::InvalidDocument(format!(
                    "structure element {} ({}) tags content already tagged on page {}",
                    index, element.tag, element.page
                )));
            }
        }
        Ok(())
    }

    /// Parent-tree keys of tagged annotations, by (page, annotation index).
    pub(crate) fn annotation_keys(&self) -> HashMap<(usize, usize), usize> {
        self.elements
            .iter()
            .filter_map(|e| match e.content {
                StructContent::Annotation(a) => Some((e.page, a)),
                StructContent::MarkedContent(_) => None,
            })
            .enumerate()
            .map(|(k, target)| (target, self.page_count + k))
            .collect()
    }

    /// Objects emitted: one per element plus root, parent tree and document node.
    pub(crate) fn object_count(&self) -> usize {
        self.elements.len() + 3
    }

    /// Object number of the structure tree root given the first element's.
    pub(crate) fn root_id(&self, first_id: u32) -> u32 {
        first_id + self.elements.len() as u32
    }

    /// Encode elements, root, parent tree and document node, in that order.
    pub(crate) fn encode(&self, first_id: u32, page_ids: &[u32], annot_ids: &[Vec<u32>], lang: &str) -> Vec<Dict> {
        let root_id = self.root_id(first_id);
        let parent_tree_id = root_id + 1;
        let document_id = root_id + 2;
        let element_id = |index: usize| first_id + index as u32;

        let mut objects = Vec::with_capacity(self.object_count());
        for element in self.elements {
            let page = page_ids.get(element.page).copied().unwrap_or(0);
            let mut dict = Dict::typed("StructElem")
                .with("S", Token::name(&element.tag))
                .with("P", Token::reference(document_id))
                .with("Pg", Token::reference(page));
            match element.content {
                StructContent::MarkedContent(mcid) => dict.insert("K", Token::int(mcid as i64)),
                StructContent::Annotation(a) => {
                    let annot = annot_ids
                        .get(element.page)
                        .and_then(|ids| ids.get(a))
                        .copied()
                        .unwrap_or(0);
                    let objr = Dict::typed("OBJR")
                        .with("Obj", Token::reference(annot))
                        .with("Pg", Token::reference(page));
                    dict.insert("K", objr);
                },
            }
            if let Some(lang) = &element.lang {
                dict.insert("Lang", Token::text(lang));
            }
            if let Some(alt) = &element.alt {
                dict.insert("Alt", Token::text(alt));
            }
            if let Some(text) = &element.actual_text {
                dict.insert("ActualText", Token::text(text));
            }
            objects.push(dict);
        }

        let annotation_count = self.annotation_keys().len();
        objects.push(
            Dict::typed("StructTreeRoot")
                .with("K", Token::reference(document_id))
                .with("ParentTree", Token::reference(parent_tree_id))
                .with("ParentTreeNextKey", Token::int((self.page_count + annotation_count) as i64)),
        );

        let mut nums = Vec::new();
        for page in 0..self.page_count {
            let mut slots: Vec<Option<usize>> = Vec::new();
            for (index, element) in self.elements.iter().enumerate() {
                if let (true, StructContent::MarkedContent(mcid)) = (element.page == page, element.content) {
                    let mcid = mcid as usize;
                    if slots.len() <= mcid {
                        slots.resize(mcid + 1, None);
                    }
                    slots[mcid] = Some(index);
                }
            }
            nums.push(Token::int(page as i64));
            nums.extend(array(slots.into_iter().map(|slot| match slot {
                Some(index) => Token::reference(element_id(index)),
                None => Token::Null,
            })));
        }
        let annotated = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.content, StructContent::Annotation(_)));
        for (k, (index, _)) in annotated.enumerate() {
            nums.push(Token::int((self.page_count + k) as i64));
            nums.push(Token::reference(element_id(index)));
        }
        objects.push(Dict::new().with("Nums", array(nums)));

        objects.push(
            Dict::typed("StructElem")
                .with("S", Token::name("Document"))
                .with("P", Token::reference(root_id))
                .with("Lang", Token::text(lang))
                .with("K", array((0..self.elements.len()).map(|i| Token::reference(element_id(i))))),
        );
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements() -> Vec<StructElement> {
        vec![
            StructElement::marked_content("H1", 0, 0),
            StructElement::marked_content("P", 0, 2).with_lang("de-DE"),
            StructElement::annotation("Link", 1, 0).with_alt("Homepage"),
            StructElement::marked_content("Figure", 1, 0).with_alt("Chart"),
        ]
    }

    #[test]
    fn test_validate() {
        let elems = elements();
        let tree = StructureTree::new(&elems, 2);
        assert!(tree.validate(&[0, 1]).is_ok());
        assert!(tree.validate(&[0, 0]).is_err());

        let bad_page = [StructElement::marked_content("P", 5, 0)];
        assert!(StructureTree::new(&bad_page, 2).validate(&[0, 0]).is_err());

        let duplicate = [StructElement::marked_content("P", 0, 1), StructElement::marked_content("H1", 0, 1)];
        assert!(StructureTree::new(&duplicate, 1).validate(&[0]).is_err());
    }

    #[test]
    fn test_annotation_keys_follow_pages() {
        let elems = elements();
        let keys = StructureTree::new(&elems, 2).annotation_keys();
        assert_eq!(keys.get(&(1, 0)), Some(&2));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_encode_layout() {
        let elems = elements();
        let tree = StructureTree::new(&elems, 2);
        let objects = tree.encode(20, &[10, 11], &[vec![], vec![15]], "en-US");
        assert_eq!(objects.len(), tree.object_count());

        // elements 20..=23, root 24, parent tree 25, document 26
        assert_eq!(tree.root_id(20), 24);
        assert_eq!(objects[0].get_ref("P").map(|r| r.id), Some(26));
        assert_eq!(objects[0].get_int("K"), Some(0));
        assert_eq!(objects[2].get_dict("K").unwrap().get_ref("Obj").map(|r| r.id), Some(15));

        let root = &objects[4];
        assert!(root.is_type("StructTreeRoot"));
        assert_eq!(root.get_int("ParentTreeNextKey"), Some(3));

        let nums = objects[5].get_array("Nums").unwrap().to_vec();
        // 0 [20 null 21] 1 [23] 2 22 R
        assert_eq!(
            nums,
            vec![
                Token::int(0),
                Token::ArrayOpen,
                Token::reference(20),
                Token::Null,
                Token::reference(21),
                Token::ArrayClose,
                Token::int(1),
                Token::ArrayOpen,
                Token::reference(23),
                Token::ArrayClose,
                Token::int(2),
                Token::reference(22),
            ]
        );

        let document = &objects[6];
        assert_eq!(document.get_name("S"), Some("Document"));
        assert_eq!(document.get_refs("K").len(), 4);
    }
}
