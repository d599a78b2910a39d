use std::path::Path;

use tree_sitter::{Node, Parser};

use super::{collect_files, has_extension, read_text, Findings};

pub const CLEAN: &str = "No Python syntax errors found.";

pub fn check_python_syntax(root: &Path) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, |path| has_extension(path, &["py"]));

    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    if let Err(err) = parser.set_language(&language) {
        findings.push(root, format!("python parser failed to initialize: {err}"));
        return findings.render(CLEAN);
    }

    for path in files {
        let Some(source) = read_text(&path, &mut findings) else {
            continue;
        };
        let Some(tree) = parser.parse(&source, None) else {
            findings.push(&path, "parse error: parser returned no tree");
            continue;
        };
        let root_node = tree.root_node();
        if !root_node.has_error() {
            continue;
        }
        match first_error(root_node) {
            Some(node) => {
                let position = node.start_position();
                let message = if node.is_missing() {
                    format!("syntax error: missing {}", node.kind())
                } else {
                    "syntax error: invalid syntax".to_string()
                };
                findings.push_line(&path, position.row + 1, message);
            }
            None => findings.push(&path, "syntax error"),
        }
    }

    findings.render(CLEAN)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}
