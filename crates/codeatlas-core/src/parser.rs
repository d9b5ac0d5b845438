//! Tree-Sitter Parser Provider
//!
//! Maps file paths to language tags and, where a grammar is compiled in,
//! to parsed syntax trees. Languages without a grammar run their strategies
//! in fallback mode over the raw text.
//!
//! Grammar handles are cached per language inside each provider instance;
//! providers are cheap to construct and each extraction worker owns one
//! (tree-sitter parsers are not shareable across threads).

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;
use tree_sitter::{Language as TsLanguage, Parser, Tree};

// ============================================================================
// Language Tags
// ============================================================================

/// Closed set of language tags, keyed by extension (plus the Dockerfile
/// basename rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Java,
    Go,
    Html,
    Css,
    Cpp,
    CSharp,
    Rust,
    Dart,
    Php,
    Ruby,
    Kotlin,
    Swift,
    Scala,
    Lua,
    Bash,
    Yaml,
    Sql,
    Terraform,
    Proto,
    GraphQl,
    Json,
    Dockerfile,
}

impl Language {
    /// Get the language tag as written into node records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::Go => "Go",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Cpp => "CPP",
            Language::CSharp => "CSharp",
            Language::Rust => "Rust",
            Language::Dart => "Dart",
            Language::Php => "PHP",
            Language::Ruby => "Ruby",
            Language::Kotlin => "Kotlin",
            Language::Swift => "Swift",
            Language::Scala => "Scala",
            Language::Lua => "Lua",
            Language::Bash => "Bash",
            Language::Yaml => "YAML",
            Language::Sql => "SQL",
            Language::Terraform => "Terraform",
            Language::Proto => "Proto",
            Language::GraphQl => "GraphQL",
            Language::Json => "JSON",
            Language::Dockerfile => "Dockerfile",
        }
    }

    /// Detect language from a file path.
    ///
    /// Checks the Dockerfile basename rule first, then the extension table.
    /// Returns `None` for unrecognized files.
    pub fn from_path(path: &Path) -> Option<Self> {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with("Dockerfile") {
                return Some(Language::Dockerfile);
            }
        }
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect language from an extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        get_extension_map().get(ext.to_lowercase().as_str()).copied()
    }

    /// All recognized file extensions (excludes the Dockerfile basename rule).
    pub fn all_extensions() -> &'static [&'static str] {
        &[
            "ts", "tsx", "js", "jsx", "py", "java", "go", "html", "htm", "css", "cpp", "cc",
            "cxx", "h", "hpp", "cs", "rs", "dart", "php", "rb", "kt", "kts", "swift", "scala",
            "sc", "lua", "sh", "bash", "zsh", "yml", "yaml", "sql", "tf", "proto", "graphql",
            "gql", "json",
        ]
    }

    /// The grammar used to parse files of this language, if one is compiled in.
    pub fn grammar(&self) -> Option<Grammar> {
        match self {
            Language::TypeScript => Some(Grammar::TypeScript),
            Language::JavaScript => Some(Grammar::JavaScript),
            Language::Python => Some(Grammar::Python),
            Language::Java => Some(Grammar::Java),
            Language::Go => Some(Grammar::Go),
            Language::Cpp => Some(Grammar::Cpp),
            Language::CSharp => Some(Grammar::CSharp),
            Language::Rust => Some(Grammar::Rust),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static extension to language mapping.
static EXTENSION_MAP: OnceLock<HashMap<&'static str, Language>> = OnceLock::new();

fn get_extension_map() -> &'static HashMap<&'static str, Language> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("ts", Language::TypeScript);
        map.insert("tsx", Language::TypeScript);
        map.insert("js", Language::JavaScript);
        map.insert("jsx", Language::JavaScript);
        map.insert("py", Language::Python);
        map.insert("java", Language::Java);
        map.insert("go", Language::Go);
        map.insert("html", Language::Html);
        map.insert("htm", Language::Html);
        map.insert("css", Language::Css);
        map.insert("cpp", Language::Cpp);
        map.insert("cc", Language::Cpp);
        map.insert("cxx", Language::Cpp);
        map.insert("h", Language::Cpp);
        map.insert("hpp", Language::Cpp);
        map.insert("cs", Language::CSharp);
        map.insert("rs", Language::Rust);
        map.insert("dart", Language::Dart);
        map.insert("php", Language::Php);
        map.insert("rb", Language::Ruby);
        map.insert("kt", Language::Kotlin);
        map.insert("kts", Language::Kotlin);
        map.insert("swift", Language::Swift);
        map.insert("scala", Language::Scala);
        map.insert("sc", Language::Scala);
        map.insert("lua", Language::Lua);
        map.insert("sh", Language::Bash);
        map.insert("bash", Language::Bash);
        map.insert("zsh", Language::Bash);
        map.insert("yml", Language::Yaml);
        map.insert("yaml", Language::Yaml);
        map.insert("sql", Language::Sql);
        map.insert("tf", Language::Terraform);
        map.insert("proto", Language::Proto);
        map.insert("graphql", Language::GraphQl);
        map.insert("gql", Language::GraphQl);
        map.insert("json", Language::Json);
        map
    })
}

// ============================================================================
// Grammars
// ============================================================================

/// Languages with a compiled-in tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    Cpp,
    CSharp,
    Java,
}

impl Grammar {
    /// Get the tree-sitter Language handle for this grammar.
    pub fn tree_sitter_language(&self) -> TsLanguage {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
            Grammar::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Grammar::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Grammar::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }
}

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur while acquiring or driving a parser.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Grammar handle rejected by the tree-sitter runtime (ABI mismatch)
    #[error("failed to set language {0}: {1}")]
    LanguageSet(&'static str, String),

    /// The parser produced no tree
    #[error("failed to parse source code")]
    ParseFailed,

    /// IO error reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Parsed Files
// ============================================================================

/// The result of running the parser provider over one file.
///
/// `tree` is present only when a grammar was available and the parse
/// succeeded; strategies treat an absent tree as the stub-tree fallback,
/// where the "root text" is the raw source.
pub struct ParsedFile {
    pub language: Language,
    pub tree: Option<Tree>,
}

// ============================================================================
// Parser Provider
// ============================================================================

/// Provides parsed syntax trees for files, caching grammar handles.
///
/// Each extraction worker owns one provider. The first file of each grammar
/// warms the handle cache; subsequent files of the same language reuse it.
pub struct ParserProvider {
    handles: HashMap<Grammar, TsLanguage>,
    /// Grammars that failed to load (ABI incompatibility); never retried
    broken: HashMap<Grammar, ()>,
}

impl Default for ParserProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserProvider {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            broken: HashMap::new(),
        }
    }

    /// Detect the language of a path. Returns `None` for unrecognized files.
    pub fn language_for(&self, path: &Path) -> Option<Language> {
        Language::from_path(path)
    }

    /// Parse a file's source, returning the language tag plus an optional
    /// tree.
    ///
    /// `None` trees mean either no grammar exists for the language, the
    /// grammar failed to load, or the parse itself failed; callers fall back
    /// to text analysis in every one of those cases.
    pub fn parse(&mut self, path: &Path, source: &str) -> Option<ParsedFile> {
        let language = self.language_for(path)?;
        let tree = self.parse_with_grammar(path, language, source);
        Some(ParsedFile { language, tree })
    }

    fn parse_with_grammar(
        &mut self,
        path: &Path,
        language: Language,
        source: &str,
    ) -> Option<Tree> {
        let mut grammar = language.grammar()?;

        // TSX files need the TSX grammar variant.
        if grammar == Grammar::TypeScript
            && path.extension().and_then(|e| e.to_str()) == Some("tsx")
        {
            grammar = Grammar::Tsx;
        }
        // .jsx parses under the TSX grammar as well.
        if grammar == Grammar::JavaScript
            && path.extension().and_then(|e| e.to_str()) == Some("jsx")
        {
            grammar = Grammar::Tsx;
        }

        if self.broken.contains_key(&grammar) {
            return None;
        }

        let handle = self
            .handles
            .entry(grammar)
            .or_insert_with(|| grammar.tree_sitter_language())
            .clone();

        let mut parser = Parser::new();
        if parser.set_language(&handle).is_err() {
            tracing::warn!("grammar unavailable for {:?}, using text fallback", grammar);
            self.broken.insert(grammar, ());
            return None;
        }

        parser.parse(source, None)
    }
}
