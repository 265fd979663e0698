//! The Engine: source text in, stored safety certificate out.
//!
//! A derivation analyzes both sources, proves the obligations between the two
//! descriptors and issues a certificate, which is persisted under its content
//! id. Proofs are CPU-bound and run on tokio's blocking pool.

use std::sync::Arc;

use transit_analyzers::{Analysis, AnalyzerRegistry};
use transit_core::{LanguageTag, PlatformDescriptor, SafetyCertificate, Side};
use transit_prover::{CancellationToken, EquivalenceProver, Validator};
use transit_store::{CertificateStore, CertificateStoreExt, InsertResult};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// One side of a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub language: LanguageTag,
    pub source: String,
    /// Root type to analyze. When absent the analyzer picks the single
    /// declaration no other declaration references.
    pub type_name: Option<String>,
}

impl SourceSpec {
    pub fn new(language: impl Into<LanguageTag>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
            type_name: None,
        }
    }

    pub fn named(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// A pair of sources to certify against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertifyRequest {
    pub left: SourceSpec,
    pub right: SourceSpec,
}

impl CertifyRequest {
    pub fn new(left: SourceSpec, right: SourceSpec) -> Self {
        Self { left, right }
    }
}

/// The main Engine struct.
///
/// Owns the analyzer registry, the prover and the certificate store. Cloning
/// an `Engine` shares the store.
pub struct Engine<S: CertificateStore> {
    registry: AnalyzerRegistry,
    prover: EquivalenceProver,
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: CertificateStore> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            prover: self.prover.clone(),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: CertificateStore + 'static> Engine<S> {
    /// Create an engine with the Rust and ReScript analyzers.
    pub fn new(store: S, config: EngineConfig) -> Self {
        let registry = AnalyzerRegistry::with_defaults(config.rust.clone(), config.rescript.clone());
        Self::with_registry(registry, store, config)
    }

    /// Create an engine with an explicit analyzer registry.
    pub fn with_registry(registry: AnalyzerRegistry, store: S, config: EngineConfig) -> Self {
        Self {
            registry,
            prover: EquivalenceProver::new(config.prover.clone()),
            store: Arc::new(store),
            config,
        }
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────────────────

    /// Analyze one source with the analyzer registered for its language.
    pub fn analyze(&self, spec: &SourceSpec) -> transit_analyzers::Result<Analysis> {
        let analyzer = self.registry.get(&spec.language)?;
        match &spec.type_name {
            Some(name) => analyzer.analyze_named(&spec.source, name),
            None => analyzer.analyze(&spec.source),
        }
    }

    fn analyze_pair(&self, request: &CertifyRequest) -> Result<(Analysis, Analysis)> {
        let left = self
            .analyze(&request.left)
            .map_err(EngineError::analysis(Side::Left))?;
        let right = self
            .analyze(&request.right)
            .map_err(EngineError::analysis(Side::Right))?;
        Ok((left, right))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Certification
    // ─────────────────────────────────────────────────────────────────────────

    /// Analyze both sources and certify the resulting descriptors.
    pub async fn certify(
        &self,
        request: &CertifyRequest,
        validator: Arc<dyn Validator>,
        token: &CancellationToken,
    ) -> Result<SafetyCertificate> {
        let (left, right) = self.analyze_pair(request)?;
        self.certify_descriptors(left.descriptor, right.descriptor, validator, token)
            .await
    }

    /// Certify two descriptors of one IR type.
    ///
    /// With `reuse_certificates` set, a verified certificate already stored
    /// under the same id is returned without proving again, unless some of
    /// its obligations were left unproven. Those are derived again.
    pub async fn certify_descriptors(
        &self,
        left: PlatformDescriptor,
        right: PlatformDescriptor,
        validator: Arc<dyn Validator>,
        token: &CancellationToken,
    ) -> Result<SafetyCertificate> {
        if self.config.reuse_certificates {
            let id = SafetyCertificate::compute_id(
                left.ir(),
                &left.summary(),
                &right.summary(),
                validator.id(),
            )?;
            match self.store.get_verified(&id).await? {
                Some(certificate) if certificate.is_settled() => {
                    tracing::debug!(%id, grade = %certificate.grade(), "reusing stored certificate");
                    return Ok(certificate);
                }
                Some(_) => tracing::debug!(%id, "stored certificate is unsettled, deriving again"),
                None => {}
            }
        }

        let certificate = self.derive(left, right, validator, token.clone()).await?;
        self.persist(&certificate).await?;
        Ok(certificate)
    }

    /// Certify every request concurrently.
    ///
    /// Results come back in request order. One failing request does not affect
    /// the others.
    pub async fn certify_all(
        &self,
        requests: &[CertifyRequest],
        validator: Arc<dyn Validator>,
        token: &CancellationToken,
    ) -> Vec<Result<SafetyCertificate>> {
        let handles: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let engine = self.clone();
                let validator = Arc::clone(&validator);
                let token = token.clone();
                tokio::spawn(async move { engine.certify(&request, validator, &token).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(EngineError::Task(e.to_string())),
            });
        }
        results
    }

    async fn derive(
        &self,
        left: PlatformDescriptor,
        right: PlatformDescriptor,
        validator: Arc<dyn Validator>,
        token: CancellationToken,
    ) -> Result<SafetyCertificate> {
        let prover = self.prover.clone();
        tokio::task::spawn_blocking(move || {
            let results = prover.prove(&left, &right, validator.as_ref(), &token)?;
            let certificate = SafetyCertificate::issue(
                left.ir().clone(),
                left.summary(),
                right.summary(),
                validator.id(),
                results,
            )?;
            Ok(certificate)
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?
    }

    async fn persist(&self, certificate: &SafetyCertificate) -> Result<()> {
        let id = certificate.id();
        match self.store.insert(certificate).await? {
            InsertResult::Inserted => {
                tracing::info!(
                    %id,
                    type_name = %certificate.left().type_name,
                    left = %certificate.left().language,
                    right = %certificate.right().language,
                    grade = %certificate.grade(),
                    "certificate issued"
                );
                Ok(())
            }
            InsertResult::Settled => {
                tracing::info!(%id, grade = %certificate.grade(), "unsettled certificate replaced");
                Ok(())
            }
            InsertResult::AlreadyExists => {
                tracing::debug!(%id, "certificate already stored");
                Ok(())
            }
            InsertResult::Collision { .. } => Err(EngineError::Collision(id)),
        }
    }
}
