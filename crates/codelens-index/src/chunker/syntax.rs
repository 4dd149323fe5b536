//! Cut positions derived from a tree-sitter parse.

use tree_sitter::{Node, Parser};

use crate::languages::Lang;

/// Byte cut positions: top-level item ends, then nested statement/block ends.
///
/// Returns `None` when no grammar is compiled in or the parser gives up.
pub(crate) fn syntax_levels(source: &str, lang: Lang) -> Option<[Vec<usize>; 2]> {
    let grammar = lang.grammar()?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::debug!(lang = %lang, error = %e, "set_language failed");
        return None;
    }
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    let top_level: Vec<Node> = named_children(root);
    let items = top_level
        .iter()
        .map(|node| line_end_after(source, node.end_byte()).unwrap_or(node.end_byte()))
        .collect();

    let mut statements = Vec::new();
    let mut stack: Vec<Node> = top_level.iter().flat_map(|n| named_children(*n)).collect();
    while let Some(node) = stack.pop() {
        if let Some(cut) = line_end_after(source, node.end_byte()) {
            statements.push(cut);
        }
        stack.extend(named_children(node));
    }

    Some([items, statements])
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Position just past the newline ending the line at `byte`, if only whitespace follows on it.
fn line_end_after(source: &str, byte: usize) -> Option<usize> {
    let rest = source.get(byte..)?;
    match rest.find('\n') {
        Some(nl) if rest[..nl].trim().is_empty() => Some(byte + nl + 1),
        None if rest.trim().is_empty() => Some(source.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_end_after_trailing_spaces() {
        let src = "a = 1  \nb = 2";
        assert_eq!(line_end_after(src, 5), Some(8));
    }

    #[test]
    fn line_end_after_mid_line() {
        let src = "foo(a, b)\n";
        assert_eq!(line_end_after(src, 5), None);
    }

    #[test]
    fn line_end_after_at_eof() {
        let src = "x = 1";
        assert_eq!(line_end_after(src, 5), Some(5));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn python_top_level_items() {
        let src = "def a():\n    return 1\n\n\ndef b():\n    return 2\n";
        let [items, statements] = syntax_levels(src, Lang::Python).unwrap();
        assert_eq!(items, vec![22, src.len()]);
        assert!(statements.contains(&22));
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn rust_statements_inside_function() {
        let src = "fn main() {\n    let a = 1;\n    let b = 2;\n}\n";
        let [items, statements] = syntax_levels(src, Lang::Rust).unwrap();
        assert_eq!(items, vec![src.len()]);
        let first_stmt_end = src.find("let b").unwrap() - 4;
        assert!(statements.contains(&first_stmt_end));
    }
}
