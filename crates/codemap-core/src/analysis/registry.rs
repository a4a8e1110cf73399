//! Language registry: maps file extensions to grammars.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The closed set of supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "typescript")]
    TypeScript,
    #[serde(rename = "tsx")]
    Tsx,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "c_sharp")]
    CSharp,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "ruby")]
    Ruby,
    #[serde(rename = "php")]
    Php,
    #[serde(rename = "cpp")]
    Cpp,
}

impl Language {
    /// Every supported language, in registration order.
    pub const ALL: [Language; 11] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Tsx,
        Language::Go,
        Language::Java,
        Language::CSharp,
        Language::Rust,
        Language::Ruby,
        Language::Php,
        Language::Cpp,
    ];

    /// Grammar name, reported as the `language` of each record.
    pub fn grammar_name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Java => "java",
            Self::CSharp => "c_sharp",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Cpp => "cpp",
        }
    }

    /// Human-readable language name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Tsx => "TSX",
            Self::Go => "Go",
            Self::Java => "Java",
            Self::CSharp => "C#",
            Self::Rust => "Rust",
            Self::Ruby => "Ruby",
            Self::Php => "PHP",
            Self::Cpp => "C/C++",
        }
    }

    /// File extensions handled by this language (lower-case, no dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi", "pyw"],
            Self::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Self::TypeScript => &["ts", "mts", "cts"],
            Self::Tsx => &["tsx"],
            Self::Go => &["go"],
            Self::Java => &["java"],
            Self::CSharp => &["cs"],
            Self::Rust => &["rs"],
            Self::Ruby => &["rb", "rake", "gemspec"],
            Self::Php => &["php", "phtml"],
            Self::Cpp => &["c", "h", "cc", "cpp", "cxx", "hpp", "hh", "hxx"],
        }
    }

    /// The tree-sitter grammar for this language.
    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Php => tree_sitter_php::LANGUAGE_PHP.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.grammar_name())
    }
}

/// Normalise an extension: lower-case, no leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Registry of supported languages.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    /// Extension to language mapping.
    languages: HashMap<String, Language>,
    /// Extensions that never resolve, regardless of mapping.
    ignored_extensions: HashSet<String>,
}

impl LanguageRegistry {
    /// Create a registry with all built-in languages and no ignored extensions.
    pub fn new() -> Self {
        let mut languages = HashMap::new();
        for language in Language::ALL {
            for ext in language.extensions() {
                languages.insert(ext.to_string(), language);
            }
        }

        Self {
            languages,
            ignored_extensions: HashSet::new(),
        }
    }

    /// Create a registry that treats the given extensions as unsupported.
    pub fn with_ignored_extensions<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        registry.ignored_extensions = ignored
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        registry
    }

    /// Resolve an extension. `None` means not supported.
    pub fn lookup(&self, extension: &str) -> Option<Language> {
        let ext = normalize_extension(extension);
        if ext.is_empty() || self.ignored_extensions.contains(&ext) {
            return None;
        }
        self.languages.get(&ext).copied()
    }

    /// Resolve a path by its extension.
    pub fn language_for_path(&self, path: impl AsRef<Path>) -> Option<Language> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.lookup(ext))
    }

    /// Check if an extension resolves to a language.
    pub fn can_parse(&self, extension: &str) -> bool {
        self.lookup(extension).is_some()
    }

    /// Whether the extension is on the ignore list.
    pub fn is_ignored(&self, extension: &str) -> bool {
        self.ignored_extensions.contains(&normalize_extension(extension))
    }

    /// List all supported extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .languages
            .keys()
            .filter(|e| !self.ignored_extensions.contains(*e))
            .map(|s| s.as_str())
            .collect();
        exts.sort_unstable();
        exts
    }

    /// List registered languages with their extensions.
    pub fn list(&self) -> Vec<(Language, &'static [&'static str])> {
        Language::ALL.iter().map(|l| (*l, l.extensions())).collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_languages() {
        let registry = LanguageRegistry::new();

        assert_eq!(registry.lookup("py"), Some(Language::Python));
        assert_eq!(registry.lookup("pyi"), Some(Language::Python));
        assert_eq!(registry.lookup("js"), Some(Language::JavaScript));
        assert_eq!(registry.lookup("mjs"), Some(Language::JavaScript));
        assert_eq!(registry.lookup("ts"), Some(Language::TypeScript));
        assert_eq!(registry.lookup("tsx"), Some(Language::Tsx));
        assert_eq!(registry.lookup("go"), Some(Language::Go));
        assert_eq!(registry.lookup("java"), Some(Language::Java));
        assert_eq!(registry.lookup("cs"), Some(Language::CSharp));
        assert_eq!(registry.lookup("rs"), Some(Language::Rust));
        assert_eq!(registry.lookup("rb"), Some(Language::Ruby));
        assert_eq!(registry.lookup("php"), Some(Language::Php));
        assert_eq!(registry.lookup("cpp"), Some(Language::Cpp));
        assert_eq!(registry.lookup("h"), Some(Language::Cpp));
    }

    #[test]
    fn test_unknown_and_empty_are_not_supported() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.lookup("xyz"), None);
        assert_eq!(registry.lookup(""), None);
        assert_eq!(registry.lookup("."), None);
        assert_eq!(registry.language_for_path("Makefile"), None);
    }

    #[test]
    fn test_case_insensitive_and_dotted() {
        let registry = LanguageRegistry::new();
        assert!(registry.can_parse("RS"));
        assert!(registry.can_parse("Py"));
        assert!(registry.can_parse(".ts"));
        assert_eq!(registry.language_for_path("src/App.TSX"), Some(Language::Tsx));
    }

    #[test]
    fn test_ignored_extensions_override_mapping() {
        let registry = LanguageRegistry::with_ignored_extensions([".js", "MD"]);
        assert_eq!(registry.lookup("js"), None);
        assert!(registry.is_ignored("md"));
        assert_eq!(registry.lookup("ts"), Some(Language::TypeScript));
        assert!(!registry.supported_extensions().contains(&"js"));
    }

    #[test]
    fn test_serde_names_match_grammar_names() {
        for language in Language::ALL {
            let json = serde_json::to_value(language).unwrap();
            assert_eq!(json, language.grammar_name());
            let back: Language = serde_json::from_value(json).unwrap();
            assert_eq!(back, language);
        }
    }

    #[test]
    fn test_every_extension_maps_back_to_its_language() {
        let registry = LanguageRegistry::new();
        for (language, extensions) in registry.list() {
            for ext in extensions {
                assert_eq!(registry.lookup(ext), Some(language), "extension {}", ext);
            }
        }
    }
}
