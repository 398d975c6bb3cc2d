use anyhow::Result;

use crate::model::{ImportSite, Language};

pub mod typescript;

/// Result of extracting import sites from one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub sites: Vec<ImportSite>,
    /// tree-sitter recovered from syntax errors; sites may be incomplete.
    pub has_syntax_errors: bool,
}

/// Trait for language-specific import extractors.
///
/// Implementations walk a tree-sitter CST and report every string-literal
/// module specifier with the byte span of its contents.
pub trait LanguageParser: Send + Sync {
    fn parse(&self, source: &str, language: Language) -> Result<ParseResult>;

    /// Which languages does this parser handle?
    fn supported_languages(&self) -> &[Language];
}

/// Registry of language parsers.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn LanguageParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Create a registry with all built-in parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(typescript::TypeScriptParser::new()));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn LanguageParser>) {
        self.parsers.push(parser);
    }

    /// Find a parser that supports the given language.
    pub fn parser_for(&self, language: Language) -> Option<&dyn LanguageParser> {
        self.parsers
            .iter()
            .find(|p| p.supported_languages().contains(&language))
            .map(|p| p.as_ref())
    }

    /// Extract import sites using the appropriate language parser.
    pub fn parse(&self, source: &str, language: Language) -> Result<ParseResult> {
        let parser = self
            .parser_for(language)
            .ok_or_else(|| anyhow::anyhow!("no parser for language: {}", language))?;
        parser.parse(source, language)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
