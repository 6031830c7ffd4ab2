//! Gateway state
//!
//! Application state for the gateway server.

use std::sync::Arc;

use support_common::ChatConfig;
use support_service::ServiceContext;

use crate::connection::SessionRegistry;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server. The registry is also the service
/// context's event publisher.
#[derive(Clone)]
pub struct GatewayState {
    /// Service context with store adapters and services
    service_context: Arc<ServiceContext>,
    /// Live connections
    registry: Arc<SessionRegistry>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(service_context: ServiceContext, registry: Arc<SessionRegistry>) -> Self {
        Self {
            service_context: Arc::new(service_context),
            registry,
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Get the session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn chat_config(&self) -> &ChatConfig {
        self.service_context.chat_config()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("service_context", &self.service_context)
            .field("registry", &self.registry)
            .finish()
    }
}
