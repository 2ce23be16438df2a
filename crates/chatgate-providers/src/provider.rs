use async_trait::async_trait;
use chatgate_core::{ProviderRequest, ProviderResult, ProxyError};
use dyn_clone::DynClone;

/// Whether a route costs money (external credentialed API) or runs on the
/// always-available edge runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Paid,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Text,
    Image,
}

/// One upstream inference API.
///
/// `invoke` returns `Ok(ProviderResult::Error { .. })` when the upstream
/// answered with a failure, and `Err` only when no usable answer arrived
/// (transport failure, undecodable success body).
#[async_trait]
pub trait Provider: DynClone + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn tier(&self) -> Tier;

    fn output(&self) -> OutputKind;

    /// Checked before a request is dispatched to this provider as the
    /// primary route. Fails with a configuration error when the provider
    /// cannot run at all in this deployment.
    fn require_binding(&self) -> Result<(), ProxyError> {
        Ok(())
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResult, ProxyError>;
}

dyn_clone::clone_trait_object!(Provider);
