//! XML response formatter

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};
use sxd_document::{parser, writer};
use tracing::warn;

use super::ResponseFormatter;

const INDENT: &str = "  ";

/// Stores XML bodies as indented `.xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormatter;

impl ResponseFormatter for XmlFormatter {
    fn extension(&self) -> &'static str {
        ".xml"
    }

    fn format(&self, content: &[u8]) -> Option<Vec<u8>> {
        let text = std::str::from_utf8(content).ok()?;
        let package = match parser::parse(text) {
            Ok(package) => package,
            Err(e) => {
                warn!("Storing unparseable XML body unchanged: {e:?}");
                return None;
            }
        };

        let document = package.as_document();
        for child in document.root().children() {
            if let ChildOfRoot::Element(element) = child {
                indent_element(&document, element, 0);
            }
        }

        let mut out = Vec::with_capacity(content.len() * 2);
        writer::format_document(&document, &mut out).ok()?;
        out.push(b'\n');
        Some(out)
    }
}

/// Re-indent element-only content; mixed content is left untouched
fn indent_element<'d>(document: &Document<'d>, element: Element<'d>, depth: usize) {
    let children = element.children();

    let mut significant = Vec::with_capacity(children.len());
    for child in children {
        match child {
            ChildOfElement::Text(text) if text.text().trim().is_empty() => {}
            ChildOfElement::Text(_) => return,
            other => significant.push(other),
        }
    }

    if significant.is_empty() {
        return;
    }

    let inner = format!("\n{}", INDENT.repeat(depth + 1));
    let outer = format!("\n{}", INDENT.repeat(depth));

    element.clear_children();
    for child in significant {
        if let ChildOfElement::Element(child_element) = child {
            indent_element(document, child_element, depth + 1);
        }
        element.append_child(document.create_text(&inner));
        element.append_child(child);
    }
    element.append_child(document.create_text(&outer));
}
