//! Small helpers over `roxmltree` nodes.

use roxmltree::Node;

/// Direct element children with the given expanded name.
pub(crate) fn child_elements<'a, 'input: 'a, 'n>(
    node: Node<'a, 'input>,
    ns: &'n str,
    name: &'n str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'n
where
    'a: 'n,
{
    node.children()
        .filter(move |child| child.is_element() && child.has_tag_name((ns, name)))
}

/// First direct element child with the given expanded name.
pub(crate) fn child_element<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    ns: &str,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.has_tag_name((ns, name)))
}

/// All descendant text of an element, concatenated and trimmed.
///
/// Reading only the first text node would let a comment split a value, so
/// `user<!---->@evil.example` must read as the whole address.
pub(crate) fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_spans_comments_and_children() {
        let doc = roxmltree::Document::parse("<a> user<!-- x -->@example.com </a>").unwrap();
        assert_eq!(element_text(doc.root_element()), "user@example.com");
    }

    #[test]
    fn finds_children_by_namespace() {
        let doc = roxmltree::Document::parse(
            r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x/><b:x/><a:x/></r>"#,
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(child_elements(root, "urn:a", "x").count(), 2);
        assert!(child_element(root, "urn:b", "x").is_some());
        assert!(child_element(root, "urn:c", "x").is_none());
    }
}
