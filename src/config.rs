//! Runtime configuration for the billing session and the sandbox storefront.

use crate::domain::product::ProductType;

/// Settings applied by [`crate::application::session::BillingSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Product type attached to every catalog query.
    pub product_type: ProductType,
    /// Forwarded to the provider when launching a purchase flow.
    pub offer_personalized: bool,
}

/// Settings for [`crate::infrastructure::sandbox::SandboxProvider`].
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Package name written into generated receipts.
    pub package_name: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            package_name: "com.example.game".to_string(),
        }
    }
}
