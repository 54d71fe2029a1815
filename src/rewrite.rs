//! CORS-safe content rewriting
//!
//! A canvas that draws a cross-origin image without CORS approval becomes
//! tainted and can no longer be exported. [`cors_safe_html`] produces markup
//! that cannot taint a canvas by swapping every externally hosted `<img>` for
//! a fixed-size placeholder block. The rasterizer uses the same placeholder
//! (see [`Placeholder`]) when an individual image fails to load.
//!
//! The input is parsed as a detached fragment with `scraper`, so malformed
//! markup degrades the same way a browser's tolerant parser would.

use scraper::{Html, Node, Selector};

use crate::config::Color;
use crate::rendering::raster::MAX_CANVAS_DIMENSION;

/// Width used when an image declares none
pub const DEFAULT_PLACEHOLDER_WIDTH: u32 = 200;
/// Height used when an image declares none
pub const DEFAULT_PLACEHOLDER_HEIGHT: u32 = 150;

/// Label drawn in the middle of a placeholder block
pub const PLACEHOLDER_LABEL: &str = "Image";

/// The block substituted for an image that cannot be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub width: u32,
    pub height: u32,
}

impl Placeholder {
    pub const FILL: Color = Color::rgb(0xf0, 0xf0, 0xf0);
    pub const BORDER: Color = Color::rgb(0xcc, 0xcc, 0xcc);
    pub const BORDER_WIDTH: u32 = 2;
    pub const LABEL: Color = Color::rgb(0x99, 0x99, 0x99);

    /// Placeholder sized after the declared `width`/`height` of an `<img>`
    pub fn for_image(element: &scraper::node::Element) -> Self {
        Self {
            width: dimension_attr(element.attr("width")).unwrap_or(DEFAULT_PLACEHOLDER_WIDTH),
            height: dimension_attr(element.attr("height")).unwrap_or(DEFAULT_PLACEHOLDER_HEIGHT),
        }
    }

    /// Block-level markup for this placeholder
    pub fn to_html(self) -> String {
        format!(
            "<div style=\"display: flex; align-items: center; justify-content: center; \
             width: {}px; height: {}px; background-color: {}; border: {}px dashed {}; \
             color: {}; font-family: Arial, sans-serif; font-size: 14px;\">{}</div>",
            self.width,
            self.height,
            Self::FILL,
            Self::BORDER_WIDTH,
            Self::BORDER,
            Self::LABEL,
            PLACEHOLDER_LABEL
        )
    }
}

/// Parse an HTML length attribute such as `600`, `600px` or ` 600 `.
/// Percentages and other units are treated as undeclared. Values are capped
/// at [`MAX_CANVAS_DIMENSION`]; no canvas could hold anything larger.
pub(crate) fn dimension_attr(value: Option<&str>) -> Option<u32> {
    let v = value?.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    match v.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 1.0 => Some(n.round().min(MAX_CANVAS_DIMENSION as f64) as u32),
        _ => None,
    }
}

/// True when `src` points at an externally hosted resource
pub fn is_external_src(src: &str) -> bool {
    let prefix: String = src.trim_start().chars().take(6).collect::<String>().to_ascii_lowercase();
    prefix.starts_with("http:") || prefix.starts_with("https:")
}

/// Every external image URL referenced by `html`, in document order
pub fn external_image_sources(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let img_sel = Selector::parse("img[src]").unwrap();
    fragment
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| is_external_src(src))
        .map(|src| src.to_string())
        .collect()
}

/// Rewrite `html` so that no `<img>` references an external origin.
///
/// Images without an `http`/`https` source are left untouched.
pub fn cors_safe_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    // parse_fragment wraps the content in a synthetic <html> element
    let root = fragment.root_element();
    for child in root.children() {
        serialize_node(child, &mut out, false);
    }
    out
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script", "xmp", "iframe", "noembed", "noframes"];

fn serialize_node(node: ego_tree::NodeRef<'_, Node>, out: &mut String, raw_text: bool) {
    match node.value() {
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment.comment);
            out.push_str("-->");
        }
        Node::Element(element) => {
            let name = element.name();
            if name == "img" && element.attr("src").is_some_and(is_external_src) {
                out.push_str(&Placeholder::for_image(element).to_html());
                return;
            }

            out.push('<');
            out.push_str(name);
            for (key, value) in element.attrs() {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&name);
            for child in node.children() {
                serialize_node(child, out, raw);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Fragment | Node::Document => {
            for child in node.children() {
                serialize_node(child, out, raw_text);
            }
        }
        Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img_count(html: &str) -> usize {
        let doc = Html::parse_fragment(html);
        doc.select(&Selector::parse("img").unwrap()).count()
    }

    #[test]
    fn test_external_images_become_placeholders() {
        let html = r#"<p>Hi</p><img src="https://cdn.example.com/logo.png" width="120" height="40"><img src="http://x.test/a.gif">"#;
        let safe = cors_safe_html(html);
        assert_eq!(img_count(&safe), 0);
        assert!(safe.contains("width: 120px; height: 40px;"));
        assert!(safe.contains("width: 200px; height: 150px;"));
        assert!(safe.contains("dashed #cccccc"));
        assert!(safe.contains(">Image</div>"));
        assert!(safe.starts_with("<p>Hi</p>"));
    }

    #[test]
    fn test_local_images_are_kept() {
        let html = r#"<img src="/static/logo.png" alt="logo"><img src="data:image/png;base64,AAAA">"#;
        let safe = cors_safe_html(html);
        assert_eq!(img_count(&safe), 2);
        assert!(safe.contains(r#"src="/static/logo.png""#));
        assert!(!safe.contains(PLACEHOLDER_LABEL));
    }

    #[test]
    fn test_rewrite_is_idempotent_on_safe_content() {
        let html = r#"<table><tbody><tr><td><img src="cid:banner" width="600"></td></tr></tbody></table><p>a &amp; b</p>"#;
        let once = cors_safe_html(html);
        let twice = cors_safe_html(&once);
        assert_eq!(once, twice);
        assert_eq!(img_count(&once), img_count(html));
    }

    #[test]
    fn test_placeholder_rewrite_is_stable() {
        let once = cors_safe_html(r#"<img src="HTTPS://example.com/x.png">"#);
        assert_eq!(cors_safe_html(&once), once);
    }

    #[test]
    fn test_escaping_and_raw_text() {
        let html = r#"<style>p > a { color: red; }</style><p title="say &quot;hi&quot;">1 &lt; 2</p><br>"#;
        let safe = cors_safe_html(html);
        assert!(safe.contains("<style>p > a { color: red; }</style>"));
        assert!(safe.contains(r#"title="say &quot;hi&quot;""#));
        assert!(safe.contains("1 &lt; 2"));
        assert!(safe.contains("<br>"));
        assert!(!safe.contains("</br>"));
    }

    #[test]
    fn test_malformed_markup_degrades_gracefully() {
        let safe = cors_safe_html(r#"<div><p>unclosed <img src="https://x.test/y.png"><b>bold"#);
        assert!(safe.contains(PLACEHOLDER_LABEL));
        assert!(safe.contains("bold"));
        assert_eq!(img_count(&safe), 0);
    }

    #[test]
    fn test_external_image_sources() {
        let html = r#"<img src="https://a.test/1.png"><img src="/2.png"><img src="http://b.test/3.png">"#;
        assert_eq!(
            external_image_sources(html),
            vec!["https://a.test/1.png".to_string(), "http://b.test/3.png".to_string()]
        );
    }

    #[test]
    fn test_dimension_attr() {
        assert_eq!(dimension_attr(Some("600")), Some(600));
        assert_eq!(dimension_attr(Some(" 40px ")), Some(40));
        assert_eq!(dimension_attr(Some("100%")), None);
        assert_eq!(dimension_attr(Some("0")), None);
        assert_eq!(dimension_attr(None), None);
        assert_eq!(dimension_attr(Some("99999999999")), Some(MAX_CANVAS_DIMENSION));
        assert_eq!(dimension_attr(Some("1e300")), Some(MAX_CANVAS_DIMENSION));
    }
}
