// # Reloader Trait
//
// Defines the interface for asking the forwarder to re-read its config.
//
// ## Implementations
//
// - `CommandReloader`: runs a service-manager command (`systemctl reload`)

use async_trait::async_trait;

/// Trait for forwarder reload implementations
///
/// A reload is a single attempt. Implementations must not retry; the
/// engine surfaces the failure and the operator decides what to do.
#[async_trait]
pub trait Reloader: Send + Sync {
    /// Reload the forwarder
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The reload completed successfully
    /// - `Err(Error::ReloadFailed)`: The reload could not be started, exited
    ///   non-zero, or timed out
    async fn reload(&self) -> Result<(), crate::Error>;

    /// Get the reloader name (for logging)
    fn reloader_name(&self) -> &'static str;
}
