use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{Handler, ImageHandler, LinkHandler, ProfileHandler, TopicHandler};
use crate::capabilities::Capabilities;
use crate::core::config::AppConfig;
use crate::core::models::SignalKind;

/// Static routing table from signal kind to the handlers that process it.
///
/// Built once at startup; lookups never mutate it.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    routes: HashMap<SignalKind, Vec<Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Standard routing: links and topics to web search, images to vision
    /// (unless disabled), profile-eligible senders to the profile store.
    #[must_use]
    pub fn from_config(config: &AppConfig, capabilities: &Capabilities) -> Self {
        let mut builder = Self::builder()
            .register(
                SignalKind::Link,
                Arc::new(LinkHandler::new(capabilities.web_search.clone())),
            )
            .register(
                SignalKind::TopicReference,
                Arc::new(TopicHandler::new(capabilities.web_search.clone())),
            )
            .register(
                SignalKind::ProfileReferenceable,
                Arc::new(ProfileHandler::new(capabilities.profiles.clone())),
            );

        if config.enable_image_analysis {
            builder = builder.register(
                SignalKind::Image,
                Arc::new(ImageHandler::new(
                    capabilities.attachments.clone(),
                    capabilities.vision.clone(),
                )),
            );
        } else {
            info!("Image analysis disabled; image signals will not be dispatched");
        }

        builder.build()
    }

    /// Handlers for `kind` in registration order; empty when none are
    /// registered.
    #[must_use]
    pub fn lookup(&self, kind: SignalKind) -> &[Arc<dyn Handler>] {
        self.routes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    routes: HashMap<SignalKind, Vec<Arc<dyn Handler>>>,
}

impl HandlerRegistryBuilder {
    #[must_use]
    pub fn register(mut self, kind: SignalKind, handler: Arc<dyn Handler>) -> Self {
        self.routes.entry(kind).or_default().push(handler);
        self
    }

    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            routes: self.routes,
        }
    }
}
