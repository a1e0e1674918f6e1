//! Model provider registry.
//!
//! An explicit registry object dispatching model URLs to a fixed set of
//! provider kinds by case-insensitive URL prefix: local directories plus
//! two HTTP-backed providers. The registry resolves a URL into a tagged
//! [`ResolvedModel`]; the HTTP transports behind remote endpoints are
//! external collaborators and not constructed here. Build one registry at
//! startup and pass it by reference — there is no ambient global lookup.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Where a model URL points after provider dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedModel {
    /// A local model directory, loadable through `ClientFactory`.
    LocalDirectory { dir: PathBuf },
    /// A remote model behind a provider's HTTP endpoint.
    RemoteEndpoint {
        provider: String,
        endpoint: String,
        model_id: String,
    },
}

/// One provider kind in the registry.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// URL prefix this provider owns, e.g. `ollama://`.
    fn url_prefix(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether models resolve outside the local machine's file system.
    fn is_external(&self) -> bool {
        true
    }

    /// Case-insensitive prefix match.
    fn matches(&self, url: &str) -> bool {
        url.get(..self.url_prefix().len())
            .map(|head| head.eq_ignore_ascii_case(self.url_prefix()))
            .unwrap_or(false)
    }

    /// Resolve a matching URL into a model location.
    fn resolve(&self, url: &str) -> Option<ResolvedModel>;

    /// Human-facing details page for a matching model URL, when one exists.
    fn details_url(&self, url: &str) -> Option<String>;

    /// Probe or prepare the provider. Transports are external, so the
    /// default is simply "ready".
    async fn initialize(&self, _cancel: CancellationToken) -> bool {
        true
    }
}

/// Strip a provider's prefix off a matching URL.
fn model_id<'a>(provider: &dyn ModelProvider, url: &'a str) -> Option<&'a str> {
    if provider.matches(url) {
        Some(&url[provider.url_prefix().len()..])
    } else {
        None
    }
}

/// Models stored as directories on the local file system.
pub struct LocalFileProvider;

#[async_trait]
impl ModelProvider for LocalFileProvider {
    fn name(&self) -> &str {
        "Local"
    }

    fn url_prefix(&self) -> &str {
        "file://"
    }

    fn description(&self) -> &str {
        "Models stored on the local file system"
    }

    fn is_external(&self) -> bool {
        false
    }

    fn resolve(&self, url: &str) -> Option<ResolvedModel> {
        let path = model_id(self, url)?;
        Some(ResolvedModel::LocalDirectory {
            dir: PathBuf::from(path),
        })
    }

    fn details_url(&self, _url: &str) -> Option<String> {
        None
    }
}

/// Models served by a local Ollama instance.
pub struct OllamaProvider {
    endpoint: String,
}

impl OllamaProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn url_prefix(&self) -> &str {
        "ollama://"
    }

    fn description(&self) -> &str {
        "Models served by a local Ollama instance"
    }

    fn resolve(&self, url: &str) -> Option<ResolvedModel> {
        let id = model_id(self, url)?;
        Some(ResolvedModel::RemoteEndpoint {
            provider: self.name().to_string(),
            endpoint: self.endpoint.clone(),
            model_id: id.to_string(),
        })
    }

    fn details_url(&self, url: &str) -> Option<String> {
        model_id(self, url).map(|id| format!("https://ollama.com/library/{id}"))
    }
}

/// Models served by the OpenAI API.
pub struct OpenAiProvider {
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new("https://api.openai.com/v1")
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn url_prefix(&self) -> &str {
        "openai://"
    }

    fn description(&self) -> &str {
        "Models served by the OpenAI API"
    }

    fn resolve(&self, url: &str) -> Option<ResolvedModel> {
        let id = model_id(self, url)?;
        Some(ResolvedModel::RemoteEndpoint {
            provider: self.name().to_string(),
            endpoint: self.endpoint.clone(),
            model_id: id.to_string(),
        })
    }

    fn details_url(&self, url: &str) -> Option<String> {
        model_id(self, url).map(|id| format!("https://platform.openai.com/docs/models/{id}"))
    }
}

/// Ordered set of providers; first prefix match wins.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registry with the built-in provider kinds.
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LocalFileProvider));
        registry.register(Box::new(OllamaProvider::default()));
        registry.register(Box::new(OpenAiProvider::default()));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn ModelProvider>) {
        self.providers.push(provider);
    }

    /// The provider owning this URL's prefix, if any.
    pub fn provider_for(&self, url: &str) -> Option<&dyn ModelProvider> {
        self.providers
            .iter()
            .find(|p| p.matches(url))
            .map(|p| p.as_ref())
    }

    /// Dispatch a URL to its provider and resolve it.
    pub fn resolve(&self, url: &str) -> Option<ResolvedModel> {
        self.provider_for(url)?.resolve(url)
    }

    /// Whether the URL belongs to an external (non-local) provider.
    pub fn is_external_url(&self, url: &str) -> bool {
        self.provider_for(url)
            .map(|p| p.is_external())
            .unwrap_or(false)
    }

    /// Initialize all providers concurrently; returns the names of the
    /// providers that reported ready.
    pub async fn initialize_all(&self, cancel: CancellationToken) -> Vec<String> {
        let probes = self
            .providers
            .iter()
            .map(|p| async { (p.name().to_string(), p.initialize(cancel.clone()).await) });
        futures::future::join_all(probes)
            .await
            .into_iter()
            .filter_map(|(name, ready)| ready.then_some(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}
