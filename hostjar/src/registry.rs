//! Provider registry and two-phase resolution.
//!
//! The registry is the seam between the build configuration surface and
//! provider logic. Resolution is two-phase by construction: the build first
//! registers providers and declares virtual dependencies (in any order,
//! from anywhere in the build configuration), then calls
//! [`ProviderRegistry::resolve_all`] exactly once after the declaration set
//! is final. Declaration cardinality is validated for every provider before
//! any provider runs, so an authoring mistake is reported without touching
//! the network.

use thiserror::Error;
use tracing::{debug, info};

use crate::provider::{ConfigurationProvider, Declaration, ProviderError, ResolvedArtifact};
use crate::session::BuildSession;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while registering providers or resolving declarations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A provider with this name is already registered.
    #[error("provider '{name}' is already registered")]
    DuplicateProvider { name: String },

    /// The build declared the same virtual dependency more than once.
    ///
    /// This is a build-authoring mistake, not a transient fault; fix the
    /// build declaration and re-run.
    #[error("{count} declarations found for provider '{provider}', expected at most one")]
    MultipleDeclarations { provider: String, count: usize },

    /// A declaration names a provider nobody registered.
    #[error("no provider registered under name '{name}'")]
    UnknownProvider { name: String },

    /// A provider failed to resolve its declaration.
    #[error("provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

/// Registry of configuration providers, keyed by unique name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ConfigurationProvider>>,
    declarations: Vec<Declaration>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its declared name.
    ///
    /// Names must be unique within a registry instance.
    pub fn register(&mut self, provider: Box<dyn ConfigurationProvider>) -> RegistryResult<()> {
        let name = provider.name();
        if self.providers.iter().any(|p| p.name() == name) {
            return Err(RegistryError::DuplicateProvider {
                name: name.to_string(),
            });
        }

        debug!(provider = name, "registered configuration provider");
        self.providers.push(provider);
        Ok(())
    }

    /// Record a virtual dependency declaration.
    ///
    /// Declarations are only collected here; validation and resolution
    /// happen in [`resolve_all`](Self::resolve_all) once the set is final.
    pub fn declare(&mut self, provider: impl Into<String>, version_spec: impl Into<String>) {
        let declaration = Declaration::new(provider, version_spec);
        debug!(
            provider = %declaration.provider,
            spec = %declaration.version_spec,
            "declared virtual dependency"
        );
        self.declarations.push(declaration);
    }

    /// Resolve every declaration and return the compile-only classpath.
    ///
    /// Providers with no declaration are skipped (they are optional).
    /// Cardinality is validated for the whole declaration set before any
    /// provider is invoked, so a multiplicity error means no provider logic
    /// has executed.
    pub fn resolve_all(&self, session: &mut BuildSession) -> RegistryResult<Vec<ResolvedArtifact>> {
        self.validate_declarations()?;

        let mut artifacts = Vec::new();
        for provider in &self.providers {
            let name = provider.name();
            let mut matching = self.declarations.iter().filter(|d| d.provider == name);

            let Some(declaration) = matching.next() else {
                debug!(provider = name, "no declaration, provider skipped");
                continue;
            };

            info!(
                provider = name,
                spec = %declaration.version_spec,
                "resolving virtual dependency"
            );
            let artifact =
                provider
                    .provide(session, declaration)
                    .map_err(|e| RegistryError::Provider {
                        provider: name.to_string(),
                        source: e,
                    })?;
            artifacts.push(artifact);
        }

        Ok(artifacts)
    }

    fn validate_declarations(&self) -> RegistryResult<()> {
        for declaration in &self.declarations {
            let name = &declaration.provider;

            if !self.providers.iter().any(|p| p.name() == name) {
                return Err(RegistryError::UnknownProvider { name: name.clone() });
            }

            let count = self
                .declarations
                .iter()
                .filter(|d| &d.provider == name)
                .count();
            if count > 1 {
                return Err(RegistryError::MultipleDeclarations {
                    provider: name.clone(),
                    count,
                });
            }
        }
        Ok(())
    }
}
