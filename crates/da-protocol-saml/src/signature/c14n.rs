//! Exclusive XML Canonicalization of a signed subtree.
//!
//! A `ds:Reference` covers one element of a larger document, while
//! `xml_canonicalization` works on whole documents. The referenced element
//! is therefore first written out as a standalone document:
//!
//! - each element declares exactly the namespaces the exclusive algorithm
//!   renders for it (<https://www.w3.org/TR/xml-exc-c14n/>): visibly used
//!   prefixes, plus the `InclusiveNamespaces` prefixes under the inclusive
//!   rules, minus whatever an output ancestor already declared
//! - the enveloped `ds:Signature` is left out
//! - comments are kept only for the `#WithComments` variants
//!
//! `xml_canonicalization` then produces the canonical octets (attribute
//! order, empty elements, escaping).

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node, NodeId, NodeType};
use xml_canonicalization::Canonicalizer;

use super::Canonicalization;
use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::child_element;

/// Canonical form of the element whose `ID` is `id`, with its enveloped
/// signature removed.
///
/// This is the octet stream a `ds:Reference` to `#id` is digested over.
///
/// # Errors
///
/// Returns [`SamlError::MalformedResponse`] if the document does not parse
/// or has no element with that `ID`, or [`SamlError::SignatureInvalid`] if
/// the algorithm is not supported.
pub fn canonicalize_by_id(xml: &str, id: &str, method: &Canonicalization) -> SamlResult<String> {
    let doc = Document::parse(xml)?;
    let element = find_by_id(&doc, id)?;
    let signature = child_element(element, XMLDSIG_NS, "Signature");
    canonicalize_element(element, signature, method)
}

/// Canonical form of the `ds:SignedInfo` of the signature enveloped in the
/// element whose `ID` is `id`.
///
/// This is the octet stream the `SignatureValue` is computed over.
///
/// # Errors
///
/// Returns [`SamlError::MalformedResponse`] if the element or its signature
/// cannot be found, or [`SamlError::SignatureInvalid`] if the algorithm is
/// not supported.
pub fn canonicalize_signed_info(
    xml: &str,
    id: &str,
    method: &Canonicalization,
) -> SamlResult<String> {
    let doc = Document::parse(xml)?;
    let element = find_by_id(&doc, id)?;
    let signed_info = child_element(element, XMLDSIG_NS, "Signature")
        .and_then(|sig| child_element(sig, XMLDSIG_NS, "SignedInfo"))
        .ok_or_else(|| SamlError::MalformedResponse(format!("no SignedInfo under {id}")))?;
    canonicalize_element(signed_info, None, method)
}

fn find_by_id<'a, 'input>(doc: &'a Document<'input>, id: &str) -> SamlResult<Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && n.attribute("ID") == Some(id))
        .ok_or_else(|| SamlError::MalformedResponse(format!("no element with ID {id}")))
}

/// Canonicalizes the subtree rooted at `element`, leaving out `exclude`.
pub(crate) fn canonicalize_element(
    element: Node<'_, '_>,
    exclude: Option<Node<'_, '_>>,
    method: &Canonicalization,
) -> SamlResult<String> {
    if !method.algorithm.is_supported() {
        return Err(SamlError::SignatureInvalid(format!(
            "unsupported canonicalization method {}",
            method.algorithm.uri()
        )));
    }

    let standalone = standalone_subtree(element, exclude, method)?;

    let mut output = Vec::new();
    Canonicalizer::read_from_str(&standalone)
        .write_to_writer(&mut output)
        .canonicalize(method.algorithm.with_comments())
        .map_err(|e| SamlError::SignatureInvalid(format!("canonicalization failed: {e}")))?;

    String::from_utf8(output)
        .map_err(|e| SamlError::SignatureInvalid(format!("canonical form is not UTF-8: {e}")))
}

/// Writes `element` as a standalone document carrying the exclusive
/// namespace rendering.
pub(crate) fn standalone_subtree(
    element: Node<'_, '_>,
    exclude: Option<Node<'_, '_>>,
    method: &Canonicalization,
) -> SamlResult<String> {
    let mut subtree = Subtree {
        source: element.document().input_text(),
        exclude: exclude.map(|node| node.id()),
        with_comments: method.algorithm.with_comments(),
        inclusive: method.inclusive_prefixes.iter().map(String::as_str).collect(),
        writer: Writer::new(Vec::new()),
    };
    subtree.write_element(element, &Rendered::new())?;

    String::from_utf8(subtree.writer.into_inner())
        .map_err(|e| SamlError::MalformedResponse(format!("subtree is not UTF-8: {e}")))
}

/// Prefix to URI bindings already declared by output ancestors.
/// The empty string key stands for the default namespace.
type Rendered<'a> = BTreeMap<&'a str, &'a str>;

struct Subtree<'a, 'p> {
    source: &'a str,
    exclude: Option<NodeId>,
    with_comments: bool,
    inclusive: Vec<&'p str>,
    writer: Writer<Vec<u8>>,
}

impl<'a> Subtree<'a, '_> {
    fn write_element(&mut self, element: Node<'a, '_>, rendered: &Rendered<'a>) -> SamlResult<()> {
        let qname = self.element_qname(element)?;
        let element_prefix = qname.split_once(':').map_or("", |(prefix, _)| prefix);

        let attributes: Vec<(&'a str, &'a str)> = element
            .attributes()
            .map(|attr| (&self.source[attr.range_qname()], attr.value()))
            .collect();

        // An unprefixed attribute is in no namespace and does not use the
        // default one.
        let mut wanted: Vec<&str> = vec![element_prefix];
        for (attr_qname, _) in &attributes {
            if let Some((prefix, _)) = attr_qname.split_once(':') {
                if prefix != "xml" && !wanted.contains(&prefix) {
                    wanted.push(prefix);
                }
            }
        }

        let mut declarations: Vec<(&'a str, &'a str)> = Vec::new();
        for prefix in wanted {
            let (prefix, uri) = in_scope(element, prefix).ok_or_else(|| {
                SamlError::MalformedResponse(format!("prefix {prefix} is not bound"))
            })?;
            if rendered.get(prefix).copied().unwrap_or("") != uri {
                declarations.push((prefix, uri));
            }
        }
        for prefix in &self.inclusive {
            if declarations.iter().any(|(declared, _)| declared == prefix) {
                continue;
            }
            if let Some((prefix, uri)) = in_scope(element, prefix) {
                if rendered.get(prefix).copied().unwrap_or("") != uri {
                    declarations.push((prefix, uri));
                }
            }
        }
        declarations.sort_unstable();

        let mut start = String::from(qname);
        for (prefix, uri) in &declarations {
            if prefix.is_empty() {
                start.push_str(" xmlns=\"");
            } else {
                start.push_str(" xmlns:");
                start.push_str(prefix);
                start.push_str("=\"");
            }
            escape_attribute(&mut start, uri);
            start.push('"');
        }
        for (attr_qname, value) in &attributes {
            start.push(' ');
            start.push_str(attr_qname);
            start.push_str("=\"");
            escape_attribute(&mut start, value);
            start.push('"');
        }
        self.write(Event::Start(BytesStart::from_content(start, qname.len())))?;

        let mut scope = rendered.clone();
        scope.extend(declarations);

        for child in element.children() {
            if Some(child.id()) == self.exclude {
                continue;
            }
            match child.node_type() {
                NodeType::Element => self.write_element(child, &scope)?,
                NodeType::Text => {
                    let mut text = String::new();
                    escape_text(&mut text, child.text().unwrap_or_default());
                    self.write(Event::Text(BytesText::from_escaped(text)))?;
                }
                NodeType::Comment if self.with_comments => {
                    let comment = child.text().unwrap_or_default();
                    self.write(Event::Comment(BytesText::from_escaped(comment)))?;
                }
                NodeType::PI => {
                    if let Some(pi) = child.pi() {
                        let out = self.writer.get_mut();
                        out.extend_from_slice(b"<?");
                        out.extend_from_slice(pi.target.as_bytes());
                        if let Some(value) = pi.value {
                            out.push(b' ');
                            out.extend_from_slice(value.as_bytes());
                        }
                        out.extend_from_slice(b"?>");
                    }
                }
                _ => {}
            }
        }

        self.write(Event::End(BytesEnd::new(qname)))
    }

    fn write(&mut self, event: Event<'_>) -> SamlResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| SamlError::MalformedResponse(format!("XML write error: {e}")))
    }

    /// The element's qualified name as written in the source.
    fn element_qname(&self, element: Node<'a, '_>) -> SamlResult<&'a str> {
        let text = &self.source[element.range()];
        let name = text
            .strip_prefix('<')
            .map(|rest| {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
                    .unwrap_or(rest.len());
                &rest[..end]
            })
            .filter(|name| !name.is_empty());
        name.ok_or_else(|| SamlError::MalformedResponse("unreadable element name".to_string()))
    }
}

/// The binding of `prefix` in scope at `element`. An unbound default
/// namespace is the empty URI.
fn in_scope<'a>(element: Node<'a, '_>, prefix: &str) -> Option<(&'a str, &'a str)> {
    let wanted = if prefix.is_empty() { None } else { Some(prefix) };
    match element.namespaces().find(|ns| ns.name() == wanted) {
        Some(ns) => Some((ns.name().unwrap_or(""), ns.uri())),
        None if wanted.is_none() => Some(("", "")),
        None => None,
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_text(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
