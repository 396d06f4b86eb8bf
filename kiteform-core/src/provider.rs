//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific remote service (Buildkite, ...).
//! It is responsible for turning Effects into actual API calls.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "buildkite_pipeline")
    fn name(&self) -> &'static str;
}

/// Main Provider trait
///
/// `Desired` is the typed configuration a user declares, `Observed` is the
/// typed state read back from the remote API.
pub trait Provider: Send + Sync {
    type Desired: Clone + Send + Sync;
    type Observed: Clone + Send + Sync;

    /// Name of this Provider (e.g., "buildkite")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource by its remote identifier
    ///
    /// `prior` is the last known state, if any. Returns `State::not_found()`
    /// if the resource no longer exists remotely.
    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a Self::Observed>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the remote identifier
    fn create<'a>(
        &'a self,
        resource: &'a Resource<Self::Desired>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>>;

    /// Update a resource in place
    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State<Self::Observed>,
        to: &'a Resource<Self::Desired>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>>;

    /// Delete a resource
    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Provider implementation for boxed providers
impl<P: Provider + ?Sized> Provider for Box<P> {
    type Desired = P::Desired;
    type Observed = P::Observed;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a Self::Observed>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>> {
        (**self).read(id, identifier, prior)
    }

    fn create<'a>(
        &'a self,
        resource: &'a Resource<Self::Desired>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>> {
        (**self).create(resource)
    }

    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State<Self::Observed>,
        to: &'a Resource<Self::Desired>,
    ) -> BoxFuture<'a, ProviderResult<State<Self::Observed>>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        type Desired = String;
        type Observed = String;

        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read<'a>(
            &'a self,
            id: &'a ResourceId,
            _identifier: &'a str,
            _prior: Option<&'a String>,
        ) -> BoxFuture<'a, ProviderResult<State<String>>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create<'a>(
            &'a self,
            resource: &'a Resource<String>,
        ) -> BoxFuture<'a, ProviderResult<State<String>>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update<'a>(
            &'a self,
            id: &'a ResourceId,
            _identifier: &'a str,
            _from: &'a State<String>,
            to: &'a Resource<String>,
        ) -> BoxFuture<'a, ProviderResult<State<String>>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete<'a>(
            &'a self,
            _id: &'a ResourceId,
            _identifier: &'a str,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider = MockProvider;
        let id = ResourceId::new("test", "example");
        let state = provider.read(&id, "gone", None).await.unwrap();
        assert!(!state.exists());
    }

    #[tokio::test]
    async fn boxed_provider_delegates_create() {
        let provider: Box<MockProvider> = Box::new(MockProvider);
        let resource = Resource::new("test", "example", "attrs".to_string());
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists());
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn provider_error_display_includes_resource() {
        let err = ProviderError::new("boom").for_resource(ResourceId::new("test", "example"));
        assert_eq!(err.to_string(), "[test.example] boom");
    }
}
