//! Language-keyed analyzer lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use transit_core::LanguageTag;

use crate::error::{AnalysisError, Result};
use crate::rescript::{ReScriptAnalyzer, ReScriptConfig};
use crate::rust::{RustAnalyzer, RustConfig};
use crate::traits::{Analysis, Analyzer};

/// Analyzers by language tag.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: BTreeMap<LanguageTag, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the Rust and ReScript analyzers.
    pub fn with_defaults(rust: RustConfig, rescript: ReScriptConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RustAnalyzer::new(rust)));
        registry.register(Arc::new(ReScriptAnalyzer::new(rescript)));
        registry
    }

    /// Register `analyzer` under its language, replacing any previous one.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        let language = analyzer.language();
        if self.analyzers.insert(language.clone(), analyzer).is_some() {
            tracing::debug!(%language, "replaced analyzer");
        }
    }

    pub fn get(&self, language: &LanguageTag) -> Result<&Arc<dyn Analyzer>> {
        self.analyzers
            .get(language)
            .ok_or_else(|| AnalysisError::UnknownLanguage(language.clone()))
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageTag> {
        self.analyzers.keys()
    }

    /// Analyze `source` with the analyzer registered for `language`.
    pub fn analyze(&self, language: &LanguageTag, source: &str) -> Result<Analysis> {
        self.get(language)?.analyze(source)
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("languages", &self.analyzers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_lookup() {
        let registry = AnalyzerRegistry::with_defaults(RustConfig::default(), ReScriptConfig::default());
        let languages: Vec<_> = registry.languages().map(|l| l.as_str().to_string()).collect();
        assert_eq!(languages, vec!["rescript", "rust"]);

        let analysis = registry
            .analyze(&LanguageTag::from("Rust"), "struct A { x: i64 }")
            .unwrap();
        assert_eq!(analysis.descriptor.language().as_str(), "rust");
    }

    #[test]
    fn test_unknown_language() {
        let registry = AnalyzerRegistry::new();
        assert_eq!(
            registry.analyze(&LanguageTag::from("haskell"), "data A = A").unwrap_err(),
            AnalysisError::UnknownLanguage(LanguageTag::from("haskell"))
        );
    }
}
