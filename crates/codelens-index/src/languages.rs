//! Extension → splitting strategy registry and tree-sitter grammars.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language with a syntax-aware splitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Lang {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// How a file's text is split into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Heading sections, then length-bounded.
    Markdown,
    /// Syntax-tree boundaries, then length-bounded.
    Syntax(Lang),
    /// Length-bounded with paragraph/line/word preferences only.
    Generic,
}

/// Coarse content tag stored with every fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Documentation,
    Code,
    Config,
    Text,
}

impl FragmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::Code => "code",
            Self::Config => "config",
            Self::Text => "text",
        }
    }

    #[must_use]
    pub fn classify(strategy: Strategy, extension: &str) -> Self {
        match strategy {
            Strategy::Markdown => Self::Documentation,
            Strategy::Syntax(_) => Self::Code,
            Strategy::Generic => match extension {
                "json" | "toml" | "yaml" | "yml" => Self::Config,
                _ => Self::Text,
            },
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const BUILTIN: &[(&str, Strategy)] = &[
    ("md", Strategy::Markdown),
    ("markdown", Strategy::Markdown),
    ("py", Strategy::Syntax(Lang::Python)),
    ("pyi", Strategy::Syntax(Lang::Python)),
    ("js", Strategy::Syntax(Lang::JavaScript)),
    ("jsx", Strategy::Syntax(Lang::JavaScript)),
    ("mjs", Strategy::Syntax(Lang::JavaScript)),
    ("cjs", Strategy::Syntax(Lang::JavaScript)),
    ("ts", Strategy::Syntax(Lang::TypeScript)),
    ("mts", Strategy::Syntax(Lang::TypeScript)),
    ("cts", Strategy::Syntax(Lang::TypeScript)),
    ("tsx", Strategy::Syntax(Lang::Tsx)),
    ("rs", Strategy::Syntax(Lang::Rust)),
    ("go", Strategy::Syntax(Lang::Go)),
    ("json", Strategy::Generic),
    ("sql", Strategy::Generic),
    ("toml", Strategy::Generic),
    ("yaml", Strategy::Generic),
    ("yml", Strategy::Generic),
    ("txt", Strategy::Generic),
    ("", Strategy::Generic),
];

/// Extension → strategy table. Extensions missing from the table are never read.
///
/// Keys are lowercase without the leading dot; `""` stands for extensionless files.
#[derive(Debug, Clone)]
pub struct LanguageStrategyMap {
    map: HashMap<String, Strategy>,
}

impl Default for LanguageStrategyMap {
    fn default() -> Self {
        Self {
            map: BUILTIN
                .iter()
                .map(|(ext, strategy)| ((*ext).to_owned(), *strategy))
                .collect(),
        }
    }
}

impl LanguageStrategyMap {
    /// Allow extra extensions with the generic strategy. Already mapped ones keep theirs.
    #[must_use]
    pub fn with_generic_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            self.map
                .entry(normalize_extension(ext.as_ref()))
                .or_insert(Strategy::Generic);
        }
        self
    }

    #[must_use]
    pub fn strategy_for(&self, extension: &str) -> Option<Strategy> {
        self.map.get(&normalize_extension(extension)).copied()
    }

    #[must_use]
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.strategy_for(extension).is_some()
    }
}

/// Lowercase extension without the dot, `""` when the file has none.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_maps_languages() {
        let map = LanguageStrategyMap::default();
        assert_eq!(map.strategy_for("py"), Some(Strategy::Syntax(Lang::Python)));
        assert_eq!(map.strategy_for("tsx"), Some(Strategy::Syntax(Lang::Tsx)));
        assert_eq!(map.strategy_for("md"), Some(Strategy::Markdown));
        assert_eq!(map.strategy_for("json"), Some(Strategy::Generic));
        assert_eq!(map.strategy_for(""), Some(Strategy::Generic));
    }

    #[test]
    fn unknown_extension_not_allowed() {
        let map = LanguageStrategyMap::default();
        assert!(!map.is_allowed("png"));
        assert!(!map.is_allowed("lock"));
    }

    #[test]
    fn lookup_ignores_dot_and_case() {
        let map = LanguageStrategyMap::default();
        assert_eq!(map.strategy_for(".PY"), Some(Strategy::Syntax(Lang::Python)));
    }

    #[test]
    fn extra_generic_extensions_do_not_override() {
        let map = LanguageStrategyMap::default().with_generic_extensions(["csv", ".rs"]);
        assert_eq!(map.strategy_for("csv"), Some(Strategy::Generic));
        assert_eq!(map.strategy_for("rs"), Some(Strategy::Syntax(Lang::Rust)));
    }

    #[test]
    fn extension_of_handles_dotfiles_and_bare_names() {
        assert_eq!(extension_of(Path::new("src/App.TSX")), "tsx");
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".env")), "");
    }

    #[test]
    fn kind_classification() {
        assert_eq!(
            FragmentKind::classify(Strategy::Markdown, "md"),
            FragmentKind::Documentation
        );
        assert_eq!(
            FragmentKind::classify(Strategy::Syntax(Lang::Go), "go"),
            FragmentKind::Code
        );
        assert_eq!(
            FragmentKind::classify(Strategy::Generic, "json"),
            FragmentKind::Config
        );
        assert_eq!(
            FragmentKind::classify(Strategy::Generic, "sql"),
            FragmentKind::Text
        );
        assert_eq!(FragmentKind::Documentation.to_string(), "documentation");
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
            assert!(Lang::Tsx.grammar().is_some());
        }
        #[cfg(feature = "lang-go")]
        assert!(Lang::Go.grammar().is_some());
    }
}
