//! Purpose-based language model registry

use chatwire_application::ports::language_model::{LanguageModel, LanguageModelRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps purposes to models.
///
/// Resolution order:
///  1. the model bound to the purpose
///  2. the default model
///  3. nothing, so the caller reports the missing capability
#[derive(Default)]
pub struct PurposeRouter {
    routes: HashMap<String, Arc<dyn LanguageModel>>,
    default: Option<Arc<dyn LanguageModel>>,
}

impl PurposeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.default = Some(model);
        self
    }

    pub fn with_route(mut self, purpose: impl Into<String>, model: Arc<dyn LanguageModel>) -> Self {
        self.routes.insert(purpose.into(), model);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.default.is_none()
    }
}

impl LanguageModelRegistry for PurposeRouter {
    fn select(&self, purpose: &str) -> Option<Arc<dyn LanguageModel>> {
        let model = self
            .routes
            .get(purpose)
            .or(self.default.as_ref())
            .cloned();
        if let Some(model) = &model {
            debug!(purpose, model = model.id(), "Selected language model");
        }
        model
    }
}

/// Build a router over OpenAI-compatible models from the `[openai]` section:
/// one model per distinct name, the plain `model` as default.
#[cfg(feature = "openai")]
pub fn openai_router(
    config: &crate::config::FileOpenAiConfig,
) -> Result<PurposeRouter, super::openai::OpenAiError> {
    use super::openai::OpenAiModel;

    let default: Arc<dyn LanguageModel> = Arc::new(OpenAiModel::new(config, &config.model)?);
    let mut router = PurposeRouter::new().with_default(Arc::clone(&default));
    for (purpose, name) in &config.purposes {
        let model: Arc<dyn LanguageModel> = if *name == config.model {
            Arc::clone(&default)
        } else {
            Arc::new(OpenAiModel::new(config, name)?)
        };
        router = router.with_route(purpose.clone(), model);
    }
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatwire_application::ports::language_model::{
        GatewayError, LanguageModelRequest, StreamHandle,
    };

    struct Named(&'static str);

    #[async_trait]
    impl LanguageModel for Named {
        fn id(&self) -> &str {
            self.0
        }

        async fn request(&self, _: LanguageModelRequest) -> Result<StreamHandle, GatewayError> {
            Ok(StreamHandle::ready(self.0))
        }
    }

    #[test]
    fn test_route_then_default() {
        let router = PurposeRouter::new()
            .with_default(Arc::new(Named("big")))
            .with_route("agent-selection", Arc::new(Named("small")));

        assert_eq!(router.select("agent-selection").unwrap().id(), "small");
        assert_eq!(router.select("chat").unwrap().id(), "big");
    }

    #[test]
    fn test_empty_router_selects_nothing() {
        let router = PurposeRouter::new();
        assert!(router.is_empty());
        assert!(router.select("chat").is_none());
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_openai_router_shares_default_model() {
        let mut config = crate::config::FileOpenAiConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            ..Default::default()
        };
        config
            .purposes
            .insert("agent-selection".to_string(), "gpt-4o-mini".to_string());
        config.purposes.insert("command".to_string(), "gpt-4o".to_string());

        let router = openai_router(&config).unwrap();
        assert_eq!(router.select("agent-selection").unwrap().id(), "openai/gpt-4o-mini");
        assert_eq!(router.select("command").unwrap().id(), "openai/gpt-4o");
        assert_eq!(router.select("chat").unwrap().id(), "openai/gpt-4o");
    }
}
