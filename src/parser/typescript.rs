use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::model::{Bindings, ImportKind, ImportSite, Language, Position, Span};

use super::{LanguageParser, ParseResult};

/// `import ... from '<x>'`, `export ... from '<x>'` and `import '<x>'` as
/// plain text, for regions tree-sitter could not parse.
static IMPORT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(import|export)\b(?:[\s\w{},*$]*?\bfrom)?\s*(?:'([^'\r\n]*)'|"([^"\r\n]*)")"#)
        .unwrap()
});

#[derive(Default)]
pub struct TypeScriptParser {
    // We create parsers per-call since tree_sitter::Parser is not Sync
}

impl TypeScriptParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_parser(language: Language) -> Result<Parser> {
        let mut parser = Parser::new();
        let ts_language = match language {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        };
        parser
            .set_language(&ts_language)
            .context("failed to set parser language")?;
        Ok(parser)
    }
}

impl LanguageParser for TypeScriptParser {
    fn parse(&self, source: &str, language: Language) -> Result<ParseResult> {
        let mut parser = Self::create_parser(language)?;
        let tree = parser
            .parse(source, None)
            .context("tree-sitter failed to parse")?;

        let root = tree.root_node();
        let mut extractor = Extractor::new(source);
        extractor.visit_children(root);
        if root.has_error() {
            extractor.recover(root);
        }

        Ok(ParseResult {
            sites: extractor.sites,
            has_syntax_errors: root.has_error(),
        })
    }

    fn supported_languages(&self) -> &[Language] {
        &[Language::TypeScript, Language::Tsx, Language::JavaScript]
    }
}

/// Walks a tree-sitter CST and collects module specifier literals.
struct Extractor<'a> {
    source: &'a str,
    sites: Vec<ImportSite>,
}

impl<'a> Extractor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            sites: Vec::new(),
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_node(child);
        }
    }

    fn visit_node(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => {
                self.extract_import(node);
            }
            "export_statement" if node.child_by_field_name("source").is_some() => {
                self.extract_reexport(node);
            }
            "call_expression" => {
                self.try_extract_call(node);
                // Still visit children for nested calls
                self.visit_children(node);
            }
            _ => {
                self.visit_children(node);
            }
        }
    }

    /// Build a site from a `string` node, spanning only the bytes between the quotes.
    fn string_site(&self, node: Node, kind: ImportKind, bindings: Bindings) -> Option<ImportSite> {
        if node.kind() != "string" {
            return None;
        }
        let text = self.node_text(node);
        let quote = text.chars().next()?;
        if !matches!(quote, '"' | '\'') || text.len() < 2 || !text.ends_with(quote) {
            return None;
        }

        let start = node.start_byte() + 1;
        let end = node.end_byte() - 1;
        let point = node.start_position();
        Some(ImportSite {
            specifier: self.source[start..end].to_string(),
            span: Span { start, end },
            position: Position {
                line: point.row + 1,
                column: point.column + 1,
            },
            kind,
            bindings,
        })
    }

    fn first_string_child(node: Node<'_>) -> Option<Node<'_>> {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).find(|c| c.kind() == "string");
        found
    }

    fn push_site(&mut self, node: Option<Node>, kind: ImportKind, bindings: Bindings) {
        if let Some(site) = node.and_then(|n| self.string_site(n, kind, bindings)) {
            self.sites.push(site);
        }
    }

    fn extract_import(&mut self, node: Node) {
        let mut bindings = Bindings::default();
        let mut source = node.child_by_field_name("source");
        let mut kind = ImportKind::Static;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_clause" => {
                    self.collect_import_clause(child, &mut bindings);
                }
                "import_require_clause" => {
                    // import foo = require('./foo')
                    source = child
                        .child_by_field_name("source")
                        .or_else(|| Self::first_string_child(child));
                    kind = ImportKind::ImportEquals;
                    bindings.default = true;
                }
                _ => {}
            }
        }

        self.push_site(source, kind, bindings);
    }

    fn collect_import_clause(&self, node: Node, bindings: &mut Bindings) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "identifier" => bindings.default = true,
                "namespace_import" => bindings.namespace = true,
                "named_imports" => {
                    let mut inner = child.walk();
                    for spec in child.children(&mut inner) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name) = spec.child_by_field_name("name") {
                                self.add_named(bindings, name);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn add_named(&self, bindings: &mut Bindings, name_node: Node) {
        let name = self
            .node_text(name_node)
            .trim_matches(|c| c == '\'' || c == '"');
        if name == "default" {
            bindings.default = true;
        } else if !name.is_empty() && !bindings.named.iter().any(|n| n == name) {
            bindings.named.push(name.to_string());
        }
    }

    fn extract_reexport(&mut self, node: Node) {
        let mut bindings = Bindings::default();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "*" | "namespace_export" => bindings.namespace = true,
                "export_clause" => {
                    let mut inner = child.walk();
                    for spec in child.children(&mut inner) {
                        if spec.kind() == "export_specifier" {
                            if let Some(name) = spec.child_by_field_name("name") {
                                self.add_named(&mut bindings, name);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let source = node.child_by_field_name("source");
        self.push_site(source, ImportKind::ReExport, bindings);
    }

    /// `import('./x')` and `require('./x')` with a plain string argument.
    /// Template strings and computed arguments cannot be checked statically.
    fn try_extract_call(&mut self, node: Node) {
        let (func, args) = match (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) {
            (Some(f), Some(a)) => (f, a),
            _ => return,
        };
        let first_arg = args.named_child(0);

        match func.kind() {
            "import" => {
                let bindings = Bindings {
                    default: true,
                    ..Default::default()
                };
                self.push_site(first_arg, ImportKind::Dynamic, bindings);
            }
            "identifier" if self.node_text(func) == "require" => {
                let bindings = self.require_bindings(node);
                self.push_site(first_arg, ImportKind::Require, bindings);
            }
            _ => {}
        }
    }

    /// Error recovery folds valid statements near a syntax error into `ERROR`
    /// nodes. Pick up static import/export-from literals the tree walk
    /// missed; matches inside comments, template strings or other string
    /// literals are skipped.
    fn recover(&mut self, root: Node) {
        for caps in IMPORT_TEXT.captures_iter(self.source) {
            let Some(literal) = caps.get(2).or_else(|| caps.get(3)) else {
                continue;
            };
            let quote = literal.start() - 1;
            let span = Span {
                start: literal.start(),
                end: literal.end(),
            };
            if self.sites.iter().any(|s| s.span == span) || !self.is_code(root, quote) {
                continue;
            }

            let kind = match &caps[1] {
                "export" => ImportKind::ReExport,
                _ => ImportKind::Static,
            };
            let line_start = self.source[..quote].rfind('\n').map_or(0, |i| i + 1);
            self.sites.push(ImportSite {
                specifier: literal.as_str().to_string(),
                span,
                position: Position {
                    line: self.source[..quote].matches('\n').count() + 1,
                    column: quote - line_start + 1,
                },
                kind,
                bindings: Bindings::default(),
            });
        }
        self.sites.sort_by_key(|s| s.span.start);
    }

    /// Whether the quote at `byte` opens a string literal in code.
    fn is_code(&self, root: Node, byte: usize) -> bool {
        let mut node = root.descendant_for_byte_range(byte, byte + 1);
        while let Some(n) = node {
            match n.kind() {
                "comment" | "template_string" | "regex" => return false,
                "string" => return n.start_byte() == byte,
                _ => node = n.parent(),
            }
        }
        true
    }

    /// `const { a, b: c } = require(...)` imports `a` and `b`; anything else
    /// is treated as using the module's default value.
    fn require_bindings(&self, call: Node) -> Bindings {
        let mut bindings = Bindings::default();
        let pattern = call
            .parent()
            .filter(|p| p.kind() == "variable_declarator")
            .and_then(|p| p.child_by_field_name("name"))
            .filter(|n| n.kind() == "object_pattern");

        match pattern {
            Some(pattern) => {
                let mut cursor = pattern.walk();
                for child in pattern.children(&mut cursor) {
                    match child.kind() {
                        "shorthand_property_identifier_pattern" => {
                            self.add_named(&mut bindings, child);
                        }
                        "pair_pattern" => {
                            if let Some(key) = child.child_by_field_name("key") {
                                self.add_named(&mut bindings, key);
                            }
                        }
                        _ => {}
                    }
                }
            }
            None => bindings.default = true,
        }
        bindings
    }
}
