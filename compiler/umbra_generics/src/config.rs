//! Session configuration.

use umbra_diagnostic::DiagnosticConfig;

/// Limits and policies for one generics session.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct GenericsConfig {
    /// Nested specialization limit; stops polymorphic recursion such as
    /// `f<T>` calling `f<vector<T, 1>>`.
    pub max_instantiation_depth: usize,
    /// Recursion limit for conformance through generic extensions.
    pub max_conformance_depth: usize,
    /// Bind a trailing pack with no call-site evidence to the empty pack
    /// instead of reporting it as uninferred.
    pub empty_pack_when_uninferred: bool,
    /// Error limit and deduplication for the session's diagnostic queue.
    pub diagnostics: DiagnosticConfig,
}

impl Default for GenericsConfig {
    fn default() -> Self {
        GenericsConfig {
            max_instantiation_depth: 64,
            max_conformance_depth: 16,
            empty_pack_when_uninferred: true,
            diagnostics: DiagnosticConfig::default(),
        }
    }
}

impl GenericsConfig {
    #[must_use]
    pub fn with_max_instantiation_depth(mut self, depth: usize) -> Self {
        self.max_instantiation_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_conformance_depth(mut self, depth: usize) -> Self {
        self.max_conformance_depth = depth;
        self
    }

    #[must_use]
    pub fn with_empty_pack_when_uninferred(mut self, enabled: bool) -> Self {
        self.empty_pack_when_uninferred = enabled;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}
