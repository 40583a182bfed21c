//! Pages, annotations and destinations.
//!
//! A [`Page`] owns a finished content buffer produced by the drawing layer,
//! plus the annotations and named destinations attached to it. Pages get
//! their object numbers only when the document is finalized.

use crate::error::{Error, Result};
use crate::object::{array, rect, Dict, Token};

/// Rectangle in default user space (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Lower-left x
    pub llx: f64,
    /// Lower-left y
    pub lly: f64,
    /// Upper-right x
    pub urx: f64,
    /// Upper-right y
    pub ury: f64,
}

impl Rect {
    /// Create a rectangle from its corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Create a rectangle from an origin and a size.
    pub fn from_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// `[llx lly urx ury]`.
    pub fn to_tokens(&self) -> Vec<Token> {
        rect(self.llx, self.lly, self.urx, self.ury)
    }
}

/// Optional page boundary boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageBoxes {
    /// `/CropBox`
    pub crop: Option<Rect>,
    /// `/BleedBox`
    pub bleed: Option<Rect>,
    /// `/TrimBox`
    pub trim: Option<Rect>,
    /// `/ArtBox`
    pub art: Option<Rect>,
}

/// A named position on a page, resolved to `[page /XYZ x y 0]` when written.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    /// Destination name
    pub name: String,
    /// Target x coordinate
    pub x: f64,
    /// Target y coordinate
    pub y: f64,
}

/// What a link annotation does when activated.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkAction {
    /// Open a URI
    Uri(String),
    /// Jump to a named destination
    GoToNamed(String),
    /// Jump to the top of a page (0-based index)
    GoToPage(usize),
}

/// Annotation kinds the writer knows how to build.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    /// Link annotation
    Link(LinkAction),
    /// Any other subtype; the caller supplies the type-specific entries
    Other {
        /// `/Subtype` name
        subtype: String,
    },
}

/// An annotation attached to a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Annotation rectangle
    pub rect: Rect,
    /// Subtype and behaviour
    pub kind: AnnotationKind,
    /// `/Contents` text (also used as alternate text when tagged)
    pub contents: Option<String>,
    /// Extra entries merged into the annotation dictionary
    pub extra: Dict,
}

impl Annotation {
    /// Link to a URI.
    pub fn uri(rect: Rect, uri: impl Into<String>) -> Self {
        Self::new(rect, AnnotationKind::Link(LinkAction::Uri(uri.into())))
    }

    /// Link to a named destination.
    pub fn goto_named(rect: Rect, name: impl Into<String>) -> Self {
        Self::new(rect, AnnotationKind::Link(LinkAction::GoToNamed(name.into())))
    }

    /// Link to a page by index.
    pub fn goto_page(rect: Rect, page: usize) -> Self {
        Self::new(rect, AnnotationKind::Link(LinkAction::GoToPage(page)))
    }

    /// Annotation of an arbitrary subtype.
    pub fn other(rect: Rect, subtype: impl Into<String>) -> Self {
        Self::new(
            rect,
            AnnotationKind::Other {
                subtype: subtype.into(),
            },
        )
    }

    fn new(rect: Rect, kind: AnnotationKind) -> Self {
        Self {
            rect,
            kind,
            contents: None,
            extra: Dict::new(),
        }
    }

    /// Set the `/Contents` text.
    pub fn with_contents(mut self, text: impl Into<String>) -> Self {
        self.contents = Some(text.into());
        self
    }

    /// Add an extra dictionary entry.
    pub fn with_entry(mut self, key: &str, value: impl crate::object::IntoTokens) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Structure type used when the annotation is tagged.
    pub fn struct_type(&self) -> &'static str {
        match self.kind {
            AnnotationKind::Link(_) => "Link",
            AnnotationKind::Other { .. } => "Annot",
        }
    }

    /// Build the annotation dictionary.
    ///
    /// `page_refs` are the object numbers of all pages; `resolve` maps a
    /// destination name to its explicit destination array.
    pub(crate) fn build(
        &self,
        page_ref: u32,
        page_refs: &[u32],
        resolve: &dyn Fn(&str) -> Option<Vec<Token>>,
        print_flag: bool,
        struct_parent: Option<usize>,
    ) -> Dict {
        let mut dict = Dict::typed("Annot");
        match &self.kind {
            AnnotationKind::Link(action) => {
                dict.insert("Subtype", Token::name("Link"));
                dict.insert("Rect", self.rect.to_tokens());
                dict.insert("Border", array([Token::int(0), Token::int(0), Token::int(0)]));
                match action {
                    LinkAction::Uri(uri) => {
                        let action = Dict::new()
                            .with("S", Token::name("URI"))
                            .with("URI", Token::bytes(uri.as_bytes()));
                        dict.insert("A", action);
                    },
                    LinkAction::GoToNamed(name) => match resolve(name) {
                        Some(dest) => dict.insert("Dest", dest),
                        None => log::warn!("Link to unknown destination '{}' has no target", name),
                    },
                    LinkAction::GoToPage(index) => match page_refs.get(*index) {
                        Some(&target) => dict.insert("Dest", array([Token::reference(target), Token::name("Fit")])),
                        None => log::warn!("Link to page {} beyond the last page has no target", index),
                    },
                }
            },
            AnnotationKind::Other { subtype } => {
                dict.insert("Subtype", Token::name(subtype));
                dict.insert("Rect", self.rect.to_tokens());
            },
        }
        dict.insert("P", Token::reference(page_ref));
        if let Some(text) = &self.contents {
            dict.insert("Contents", Token::text(text));
        }
        if print_flag {
            dict.insert("F", Token::int(4));
        }
        if let Some(key) = struct_parent {
            dict.insert("StructParent", Token::int(key as i64));
        }
        for key in self.extra.keys() {
            if let Some(value) = self.extra.get(key) {
                dict.insert(key, value.to_vec());
            }
        }
        dict
    }
}

/// A page: a finished content buffer plus its attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    media_box: Rect,
    boxes: PageBoxes,
    rotate: i64,
    content: Vec<u8>,
    annotations: Vec<Annotation>,
    destinations: Vec<Destination>,
}

impl Page {
    /// Create an empty page of the given size in points.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            media_box: Rect::new(0.0, 0.0, width, height),
            boxes: PageBoxes::default(),
            rotate: 0,
            content: Vec::new(),
            annotations: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// US Letter (612 x 792 pt).
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 (595 x 842 pt).
    pub fn a4() -> Self {
        Self::new(595.0, 842.0)
    }

    /// Builder-style content assignment.
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// Append operators to the content buffer.
    pub fn append_content(&mut self, content: &[u8]) {
        self.content.extend_from_slice(content);
    }

    /// The content buffer.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Media box.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// Set the optional boundary boxes.
    pub fn with_boxes(mut self, boxes: PageBoxes) -> Self {
        self.boxes = boxes;
        self
    }

    /// Set `/Rotate`; must be a multiple of 90.
    pub fn with_rotation(mut self, degrees: i64) -> Self {
        self.rotate = degrees;
        self
    }

    /// Attach an annotation; returns its index on this page.
    pub fn add_annotation(&mut self, annotation: Annotation) -> usize {
        self.annotations.push(annotation);
        self.annotations.len() - 1
    }

    /// Annotations in order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Register a named destination on this page.
    pub fn add_destination(&mut self, name: impl Into<String>, x: f64, y: f64) {
        self.destinations.push(Destination {
            name: name.into(),
            x,
            y,
        });
    }

    /// Named destinations on this page.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub(crate) fn validate(&self, index: usize) -> Result<()> {
        if self.rotate % 90 != 0 {
            return Err(Error::InvalidDocument(format!(
                "page {} rotation {} is not a multiple of 90",
                index, self.rotate
            )));
        }
        Ok(())
    }

    /// Build the page dictionary.
    pub(crate) fn build(&self, parent: u32, resources: u32, content: u32, annotations: &[u32]) -> Dict {
        let mut dict = Dict::typed("Page")
            .with("Parent", Token::reference(parent))
            .with("MediaBox", self.media_box.to_tokens());
        let boxes = [
            ("CropBox", self.boxes.crop),
            ("BleedBox", self.boxes.bleed),
            ("TrimBox", self.boxes.trim),
            ("ArtBox", self.boxes.art),
        ];
        for (key, value) in boxes {
            if let Some(b) = value {
                dict.insert(key, b.to_tokens());
            }
        }
        if self.rotate != 0 {
            dict.insert("Rotate", Token::int(self.rotate));
        }
        dict.insert("Resources", Token::reference(resources));
        dict.insert("Contents", Token::reference(content));
        if !annotations.is_empty() {
            dict.insert("Annots", array(annotations.iter().map(|&id| Token::reference(id))));
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_dests(_: &str) -> Option<Vec<Token>> {
        None
    }

    #[test]
    fn test_rect_from_size() {
        assert_eq!(Rect::from_size(10.0, 20.0, 100.0, 50.0), Rect::new(10.0, 20.0, 110.0, 70.0));
    }

    #[test]
    fn test_page_dict() {
        let page = Page::letter()
            .with_rotation(90)
            .with_boxes(PageBoxes {
                crop: Some(Rect::new(10.0, 10.0, 600.0, 780.0)),
                ..Default::default()
            });
        let dict = page.build(4, 2, 1, &[7]);
        assert!(dict.is_type("Page"));
        assert_eq!(dict.get_int("Rotate"), Some(90));
        assert!(dict.contains_key("CropBox"));
        assert!(!dict.contains_key("TrimBox"));
        assert_eq!(dict.get_refs("Annots").len(), 1);
        assert_eq!(dict.get_ref("Contents").map(|r| r.id), Some(1));
    }

    #[test]
    fn test_invalid_rotation() {
        assert!(Page::letter().with_rotation(45).validate(0).is_err());
        assert!(Page::letter().with_rotation(-270).validate(0).is_ok());
    }

    #[test]
    fn test_uri_link() {
        let link = Annotation::uri(Rect::new(0.0, 0.0, 10.0, 10.0), "https://example.com");
        let dict = link.build(3, &[3], &no_dests, false, None);
        assert_eq!(dict.get_name("Subtype"), Some("Link"));
        assert!(dict.get_dict("A").unwrap().get_token("URI").is_some());
        assert!(!dict.contains_key("F"));
    }

    #[test]
    fn test_named_link_resolves() {
        let resolve = |name: &str| (name == "intro").then(|| array([Token::reference(9), Token::name("XYZ")]));
        let link = Annotation::goto_named(Rect::new(0.0, 0.0, 10.0, 10.0), "intro");
        let dict = link.build(3, &[3], &resolve, true, Some(2));
        assert_eq!(dict.get_array("Dest").unwrap()[0], Token::reference(9));
        assert_eq!(dict.get_int("F"), Some(4));
        assert_eq!(dict.get_int("StructParent"), Some(2));
    }

    #[test]
    fn test_unknown_destination_omitted() {
        let link = Annotation::goto_named(Rect::new(0.0, 0.0, 10.0, 10.0), "missing");
        let dict = link.build(3, &[3], &no_dests, false, None);
        assert!(!dict.contains_key("Dest"));
    }

    #[test]
    fn test_generic_annotation_extra_entries() {
        let note = Annotation::other(Rect::new(0.0, 0.0, 20.0, 20.0), "Text")
            .with_contents("note")
            .with_entry("Open", Token::Bool(true));
        let dict = note.build(5, &[5], &no_dests, false, None);
        assert_eq!(dict.get_name("Subtype"), Some("Text"));
        assert_eq!(dict.get_token("Open"), Some(&Token::Bool(true)));
        assert_eq!(dict.get_ref("P").map(|r| r.id), Some(5));
        assert_eq!(note.struct_type(), "Annot");
    }
}
