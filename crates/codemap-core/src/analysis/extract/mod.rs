//! Per-language entity extraction.
//!
//! Every extractor reports to the same [`ExtractionContext`], so containment,
//! naming and call resolution behave identically across grammars.

mod context;
mod cpp;
mod csharp;
mod go;
mod java;
mod php;
mod python;
mod ruby;
mod rust;
mod traits;
mod treesitter;
mod typescript;

pub use context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind, MAX_DEPTH};
pub use cpp::CppExtractor;
pub use csharp::CSharpExtractor;
pub use go::GoExtractor;
pub use java::JavaExtractor;
pub use php::PhpExtractor;
pub use python::PythonExtractor;
pub use ruby::RubyExtractor;
pub use rust::RustExtractor;
pub use traits::Extractor;
pub use typescript::TypeScriptExtractor;

use tree_sitter::Tree;

use crate::analysis::error::ExtractError;
use crate::analysis::registry::Language;

static PYTHON: PythonExtractor = PythonExtractor;
static JAVASCRIPT: TypeScriptExtractor = TypeScriptExtractor::javascript();
static TYPESCRIPT: TypeScriptExtractor = TypeScriptExtractor::typescript();
static GO: GoExtractor = GoExtractor;
static JAVA: JavaExtractor = JavaExtractor;
static CSHARP: CSharpExtractor = CSharpExtractor;
static RUST: RustExtractor = RustExtractor;
static RUBY: RubyExtractor = RubyExtractor;
static PHP: PhpExtractor = PhpExtractor;
static CPP: CppExtractor = CppExtractor;

/// The extractor for a language.
pub fn extractor_for(language: Language) -> &'static dyn Extractor {
    match language {
        Language::Python => &PYTHON,
        Language::JavaScript => &JAVASCRIPT,
        Language::TypeScript | Language::Tsx => &TYPESCRIPT,
        Language::Go => &GO,
        Language::Java => &JAVA,
        Language::CSharp => &CSHARP,
        Language::Rust => &RUST,
        Language::Ruby => &RUBY,
        Language::Php => &PHP,
        Language::Cpp => &CPP,
    }
}

/// Extract one file with the extractor registered for `language`.
pub fn extract(
    language: Language,
    tree: &Tree,
    source: &str,
    path: &str,
) -> Result<Extraction, ExtractError> {
    extractor_for(language).extract(tree, source, path)
}


#[cfg(test)]
mod tests {
    use super::test_support::run;
    use super::*;
    use crate::analysis::models::EntityKind;

    #[test]
    fn test_every_language_dispatches() {
        for language in Language::ALL {
            let out = run(language, "empty", "");
            assert_eq!(out.entities.len(), 1, "{}", language);
            assert_eq!(out.entities[0].kind, EntityKind::File);
            assert!(!extractor_for(language).language_name().is_empty());
        }
    }
}
