//! Provider registry: configuration key -> embedder / generator constructors.
//!
//! Lookup is case-insensitive. An unknown, empty or missing key resolves to
//! the fallback provider.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::{
    Embedder, GenerationOptions, Generator, MistralEmbedder, MistralGenerator, OpenAiEmbedder,
    OpenAiGenerator,
};
use crate::{Error, Result};

pub const MISTRAL: &str = "mistral";
pub const OPENAI: &str = "openai";

pub type EmbedderCtor = Arc<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;
pub type GeneratorCtor =
    Arc<dyn Fn(&GenerationOptions) -> Result<Arc<dyn Generator>> + Send + Sync>;

/// Constructors for one provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub embedder: EmbedderCtor,
    pub generator: GeneratorCtor,
}

impl ProviderEntry {
    pub fn new<E, G>(embedder: E, generator: G) -> Self
    where
        E: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
        G: Fn(&GenerationOptions) -> Result<Arc<dyn Generator>> + Send + Sync + 'static,
    {
        Self {
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
        }
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderEntry")
    }
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    entries: HashMap<String, ProviderEntry>,
    fallback: String,
}

impl ProviderRegistry {
    pub fn new(fallback: &str) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: normalize(fallback),
        }
    }

    /// Mistral and OpenAI, falling back to OpenAI.
    pub fn with_defaults() -> Self {
        Self::new(OPENAI)
            .register(
                MISTRAL,
                ProviderEntry::new(
                    || Ok(Arc::new(MistralEmbedder::from_env()?) as Arc<dyn Embedder>),
                    |opts| Ok(Arc::new(MistralGenerator::from_env(opts)?) as Arc<dyn Generator>),
                ),
            )
            .register(
                OPENAI,
                ProviderEntry::new(
                    || Ok(Arc::new(OpenAiEmbedder::from_env()?) as Arc<dyn Embedder>),
                    |opts| Ok(Arc::new(OpenAiGenerator::from_env(opts)?) as Arc<dyn Generator>),
                ),
            )
    }

    pub fn register(mut self, key: &str, entry: ProviderEntry) -> Self {
        self.entries.insert(normalize(key), entry);
        self
    }

    /// Key that `key` resolves to.
    pub fn resolve_key(&self, key: Option<&str>) -> String {
        let requested = key.map(normalize).unwrap_or_default();
        if self.entries.contains_key(&requested) {
            return requested;
        }
        if !requested.is_empty() {
            warn!(
                "Unknown model type '{}', falling back to '{}'",
                requested, self.fallback
            );
        }
        self.fallback.clone()
    }

    fn entry(&self, key: Option<&str>) -> Result<(String, &ProviderEntry)> {
        let resolved = self.resolve_key(key);
        let entry = self.entries.get(&resolved).ok_or_else(|| {
            Error::InvalidArgument(format!("No provider registered for '{}'", resolved))
        })?;
        Ok((resolved, entry))
    }

    pub fn embedder(&self, key: Option<&str>) -> Result<Arc<dyn Embedder>> {
        let (resolved, entry) = self.entry(key)?;
        let embedder = (entry.embedder)()?;
        info!("Embedder: {} ({})", resolved, embedder.model_name());
        Ok(embedder)
    }

    pub fn generator(
        &self,
        key: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<Arc<dyn Generator>> {
        let (resolved, entry) = self.entry(key)?;
        let generator = (entry.generator)(options)?;
        info!("Generator: {} ({})", resolved, generator.model_name());
        Ok(generator)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextStream;
    use async_trait::async_trait;
    use futures::StreamExt;

    struct Named(&'static str);

    #[async_trait]
    impl Embedder for Named {
        fn model_name(&self) -> &str {
            self.0
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    #[async_trait]
    impl Generator for Named {
        fn model_name(&self) -> &str {
            self.0
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn stream(&self, _prompt: &str) -> Result<TextStream> {
            Ok(futures::stream::iter(vec![Ok(self.0.to_string())]).boxed())
        }
    }

    fn entry(name: &'static str) -> ProviderEntry {
        ProviderEntry::new(
            move || Ok(Arc::new(Named(name)) as Arc<dyn Embedder>),
            move |_| Ok(Arc::new(Named(name)) as Arc<dyn Generator>),
        )
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(OPENAI)
            .register(MISTRAL, entry("mistral-test"))
            .register(OPENAI, entry("openai-test"))
    }

    #[test]
    fn known_key_selects_provider() {
        let registry = registry();
        assert_eq!(registry.embedder(Some("mistral")).unwrap().model_name(), "mistral-test");
        assert_eq!(
            registry
                .generator(Some("openai"), &GenerationOptions::default())
                .unwrap()
                .model_name(),
            "openai-test"
        );
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(registry().resolve_key(Some("  Mistral ")), MISTRAL);
    }

    #[test]
    fn unknown_empty_or_missing_key_falls_back() {
        let registry = registry();
        for key in [Some("anthropic"), Some(""), None] {
            assert_eq!(registry.resolve_key(key), OPENAI);
            assert_eq!(registry.embedder(key).unwrap().model_name(), "openai-test");
            assert_eq!(
                registry
                    .generator(key, &GenerationOptions::json())
                    .unwrap()
                    .model_name(),
                "openai-test"
            );
        }
    }

    #[test]
    fn missing_fallback_is_an_error() {
        let registry = ProviderRegistry::new("nothing").register(MISTRAL, entry("m"));
        let err = registry.embedder(Some("other")).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn generator_options_are_forwarded() {
        let registry = ProviderRegistry::new(OPENAI).register(
            OPENAI,
            ProviderEntry::new(
                || Ok(Arc::new(Named("e")) as Arc<dyn Embedder>),
                |opts| {
                    let name = if opts.json_response { "json" } else { "text" };
                    Ok(Arc::new(Named(name)) as Arc<dyn Generator>)
                },
            ),
        );

        let json = registry.generator(None, &GenerationOptions::json()).unwrap();
        assert_eq!(json.model_name(), "json");
    }

    #[test]
    fn default_registry_knows_both_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.resolve_key(Some("MISTRAL")), MISTRAL);
        assert_eq!(registry.resolve_key(Some("openai")), OPENAI);
    }
}
