// Python source parsing via tree-sitter

use std::collections::HashSet;

use thiserror::Error;
use tracing::warn;
use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::index::FunctionNode;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error in source")]
    Syntax,
}

/// Python parser. Extracts function definitions with their spans and the
/// callee names referenced inside them. Name-based only: no type resolution,
/// no scoping. `obj.method()` is recorded as `method`, receiver discarded.
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, content: &str) -> Result<Tree, ParseError> {
        let mut parser = TreeParser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        parser.parse(content, None).ok_or(ParseError::NoTree)
    }

    /// Parse a whole source file into its function definitions, in document
    /// order, nested definitions included. A file with syntax errors is
    /// rejected wholesale so the index never holds partial trees.
    pub fn parse_functions(&self, content: &str) -> Result<Vec<FunctionNode>, ParseError> {
        let tree = self.parse_tree(content)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::Syntax);
        }

        let mut functions = Vec::new();
        visit(root, &mut |node| {
            if node.kind() == "function_definition" {
                if let Some(func) = self.extract_function(node, content) {
                    functions.push(func);
                }
            }
        });
        Ok(functions)
    }

    /// Distinct callee names referenced in a standalone source fragment. The
    /// fragment must be syntactically complete; malformed input yields an
    /// empty set, logged, never an error.
    pub fn extract_called_names(&self, fragment: &str) -> HashSet<String> {
        self.called_names_in_order(fragment).into_iter().collect()
    }

    /// Same as [`extract_called_names`](Self::extract_called_names), but keeps
    /// first-seen document order. Context assembly resolves callees in this
    /// order so results are stable across runs.
    pub fn called_names_in_order(&self, fragment: &str) -> Vec<String> {
        let tree = match self.parse_tree(fragment) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to parse source fragment: {}", e);
                return Vec::new();
            }
        };
        if tree.root_node().has_error() {
            warn!("Source fragment has syntax errors; no call names extracted");
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        visit(tree.root_node(), &mut |node| {
            if node.kind() == "call" {
                if let Some(name) = callee_name(node, fragment) {
                    if seen.insert(name.clone()) {
                        names.push(name);
                    }
                }
            }
        });
        names
    }

    fn extract_function(&self, node: Node, content: &str) -> Option<FunctionNode> {
        let name_node = node.child_by_field_name("name")?;
        let name = node_text(name_node, content)?.to_string();

        // Every call inside this definition, nested definitions included,
        // document order, duplicates kept. The caller-scan policy decides how
        // duplicates are reported.
        let mut calls = Vec::new();
        visit(node, &mut |inner| {
            if inner.kind() == "call" {
                if let Some(callee) = callee_name(inner, content) {
                    calls.push(callee);
                }
            }
        });

        Some(FunctionNode {
            name,
            start_line: node.start_position().row as u32 + 1,
            end_line: Some(node.end_position().row as u32 + 1),
            calls,
        })
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the callee name of a call expression: the identifier of a direct
/// call, or the trailing attribute of an attribute call. Calls through
/// subscripts, lambdas, or nested calls have no single name and yield None.
fn callee_name(call: Node, content: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => node_text(function, content).map(str::to_string),
        "attribute" => {
            let attribute = function.child_by_field_name("attribute")?;
            node_text(attribute, content).map(str::to_string)
        }
        _ => None,
    }
}

fn node_text<'a>(node: Node, content: &'a str) -> Option<&'a str> {
    node.utf8_text(content.as_bytes()).ok()
}

fn visit<F: FnMut(Node)>(node: Node, f: &mut F) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, f);
    }
}
