//! Block layout for email markup
//!
//! Markup is flattened into a sequence of blocks (text runs, images and
//! rules) which are then stacked vertically inside the container's content
//! box. Text wraps on an 8px character cell; h1/h2 render at twice the size.

use scraper::{Html, Node};

use crate::fit::fit_dimensions;
use crate::rewrite::{dimension_attr, Placeholder};
use crate::{Error, Result};

/// Width of one character cell at text scale 1
pub const CHAR_WIDTH: u32 = 8;
/// Height of one text line at text scale 1
pub const LINE_HEIGHT: u32 = 10;
/// Vertical gap after every block
pub const BLOCK_MARGIN: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// An `<img>` found in the markup
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub src: Option<String>,
    pub declared_width: Option<u32>,
    pub declared_height: Option<u32>,
    /// Block drawn if the image cannot be rendered
    pub placeholder: Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text { text: String, scale: u32 },
    Image(ImageRef),
    Rule,
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "center", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead",
    "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["head", "noscript", "script", "style", "template", "title"];

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    pending: String,
    scale: u32,
}

impl BlockCollector {
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() && c != '\u{a0}' {
                if !self.pending.is_empty() && !self.pending.ends_with(|c: char| c == ' ' || c == '\n') {
                    self.pending.push(' ');
                }
            } else {
                self.pending.push(c);
            }
        }
    }

    fn line_break(&mut self) {
        let trimmed = self.pending.trim_end_matches(' ').len();
        self.pending.truncate(trimmed);
        self.pending.push('\n');
    }

    fn flush(&mut self) {
        let text = self.pending.trim().to_string();
        self.pending.clear();
        if !text.is_empty() {
            self.blocks.push(Block::Text {
                text,
                scale: self.scale.max(1),
            });
        }
    }

    fn walk(&mut self, node: ego_tree::NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(t) => self.push_text(t),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    return;
                }
                match name {
                    "br" => self.line_break(),
                    "img" => {
                        self.flush();
                        self.blocks.push(Block::Image(ImageRef {
                            src: el.attr("src").map(|s| s.trim().to_string()),
                            declared_width: dimension_attr(el.attr("width")),
                            declared_height: dimension_attr(el.attr("height")),
                            placeholder: Placeholder::for_image(el),
                        }));
                    }
                    "hr" => {
                        self.flush();
                        self.blocks.push(Block::Rule);
                    }
                    _ if BLOCK_ELEMENTS.contains(&name) => {
                        self.flush();
                        let outer = self.scale;
                        if name == "h1" || name == "h2" {
                            self.scale = 2;
                        }
                        for child in node.children() {
                            self.walk(child);
                        }
                        self.flush();
                        self.scale = outer;
                    }
                    _ => {
                        for child in node.children() {
                            self.walk(child);
                        }
                    }
                }
            }
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.walk(child);
                }
            }
            _ => {}
        }
    }
}

/// Flatten `html` into layout blocks in document order
pub fn collect_blocks(html: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(html);
    let mut collector = BlockCollector {
        scale: 1,
        ..Default::default()
    };
    collector.walk(fragment.tree.root());
    collector.flush();
    collector.blocks
}

/// Greedy word wrap to `chars_per_line` columns, honoring explicit breaks
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let chars_per_line = chars_per_line.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut cur = String::new();
        for word in paragraph.split_whitespace() {
            let cur_len = cur.chars().count();
            let word_len = word.chars().count();
            if !cur.is_empty() && cur_len + word_len + 1 > chars_per_line {
                lines.push(std::mem::take(&mut cur));
            }
            if !cur.is_empty() {
                cur.push(' ');
            }
            cur.push_str(word);
        }
        lines.push(cur);
    }
    lines
}

/// What a positioned node draws
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutKind {
    Text { lines: Vec<String>, scale: u32 },
    /// Index into the loaded images of the capture
    Image { index: usize },
    Placeholder,
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub kind: LayoutKind,
}

/// How an image block resolved before layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageSlot {
    /// Loaded with the given natural size, stored at `index`
    Loaded { index: usize, width: u32, height: u32 },
    /// Replaced by its placeholder block
    Placeholder,
}

/// Stack `blocks` inside a content box of `content_width` starting at
/// `(origin_x, origin_y)`. `slots` holds one entry per image block, in order.
///
/// Returns the positioned nodes and the total content height, or a
/// `RenderError` when the stacked content no longer fits pixel coordinates.
pub fn layout_blocks(
    blocks: &[Block],
    slots: &[ImageSlot],
    origin_x: i32,
    origin_y: i32,
    content_width: u32,
) -> Result<(Vec<LayoutNode>, u32)> {
    let mut nodes = Vec::new();
    let mut y = 0u32;
    let mut slot_iter = slots.iter();

    for block in blocks {
        let (height, kind, width) = match block {
            Block::Text { text, scale } => {
                let cell = CHAR_WIDTH * scale;
                let chars_per_line = (content_width / cell.max(1)) as usize;
                let lines = wrap_text(text, chars_per_line);
                let height = u32::try_from(lines.len())
                    .ok()
                    .and_then(|n| n.checked_mul(LINE_HEIGHT * scale))
                    .ok_or_else(|| too_tall(y))?;
                (height, LayoutKind::Text { lines, scale: *scale }, content_width)
            }
            Block::Image(img) => {
                let slot = slot_iter.next().copied().unwrap_or(ImageSlot::Placeholder);
                let (w, h, kind) = match slot {
                    ImageSlot::Loaded { index, width, height } => {
                        let (w, h) = declared_size(img, width, height);
                        (w, h, LayoutKind::Image { index })
                    }
                    ImageSlot::Placeholder => (
                        img.placeholder.width,
                        img.placeholder.height,
                        LayoutKind::Placeholder,
                    ),
                };
                // images never overflow the content box
                let (w, h) = fit_dimensions(w.max(1), h.max(1), content_width.max(1), u32::MAX);
                (h, kind, w)
            }
            Block::Rule => (1, LayoutKind::Rule, content_width),
        };

        let top = i32::try_from(y)
            .ok()
            .and_then(|y| origin_y.checked_add(y))
            .ok_or_else(|| too_tall(y))?;
        nodes.push(LayoutNode {
            rect: Rect {
                x: origin_x,
                y: top,
                width,
                height,
            },
            kind,
        });
        y = y
            .checked_add(height)
            .and_then(|y| y.checked_add(BLOCK_MARGIN))
            .filter(|y| *y <= i32::MAX as u32)
            .ok_or_else(|| too_tall(y))?;
    }

    // no trailing margin after the last block
    let content_height = y.saturating_sub(if nodes.is_empty() { 0 } else { BLOCK_MARGIN });
    Ok((nodes, content_height))
}

fn too_tall(y: u32) -> Error {
    Error::RenderError(format!("content is too tall to lay out (past {}px)", y))
}

/// Size of a loaded image honoring declared attributes; a single declared
/// side derives the other from the natural aspect ratio.
fn declared_size(img: &ImageRef, natural_w: u32, natural_h: u32) -> (u32, u32) {
    let natural_w = natural_w.max(1);
    let natural_h = natural_h.max(1);
    match (img.declared_width, img.declared_height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, ((w as f64) * natural_h as f64 / natural_w as f64).round().max(1.0) as u32),
        (None, Some(h)) => (((h as f64) * natural_w as f64 / natural_h as f64).round().max(1.0) as u32, h),
        (None, None) => (natural_w, natural_h),
    }
}
