//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout service, the payment gateway and configuration.

use anyhow::Context;
use shop_core::{
    Account, BoxedPaymentGateway, CheckoutService, CheckoutUrls, Currency, MemoryStore,
    ProductCatalog, Stores,
};
use shop_stripe::StripeCheckoutGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used for gateway return URLs
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Currency all prices are quoted in
    pub currency: Currency,
    /// How often pending orders are checked against the gateway
    pub reconcile_interval: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("PORT") {
            Some(p) => p.parse().with_context(|| format!("Invalid PORT: {}", p))?,
            None => 8080,
        };

        let currency = match lookup("SHOP_CURRENCY") {
            Some(code) => Currency::parse(&code)
                .with_context(|| format!("Unsupported SHOP_CURRENCY: {}", code))?,
            None => Currency::default(),
        };

        let reconcile_secs = match lookup("RECONCILE_INTERVAL_SECS") {
            Some(s) => s
                .parse()
                .with_context(|| format!("Invalid RECONCILE_INTERVAL_SECS: {}", s))?,
            None => DEFAULT_RECONCILE_INTERVAL_SECS,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            base_url: lookup("BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            currency,
            reconcile_interval: Duration::from_secs(reconcile_secs.max(1)),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cart, checkout and order operations
    pub service: CheckoutService,
    /// Payment gateway, used directly for webhook verification
    pub gateway: BoxedPaymentGateway,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create state from the environment with the Stripe gateway
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let catalog = load_product_catalog()?;
        catalog
            .ensure_currency(config.currency)
            .context("Product catalog does not match SHOP_CURRENCY")?;
        let accounts = load_accounts()?;

        let gateway = StripeCheckoutGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        Ok(Self::build(config, catalog, accounts, Arc::new(gateway)))
    }

    /// Assemble state over an in-memory store
    pub fn build(
        config: AppConfig,
        catalog: ProductCatalog,
        accounts: Vec<Account>,
        gateway: BoxedPaymentGateway,
    ) -> Self {
        let store = Arc::new(MemoryStore::with_accounts(accounts));
        let service = CheckoutService::new(
            Stores::memory(store),
            Arc::new(catalog),
            gateway.clone(),
            CheckoutUrls::new(&config.base_url),
        )
        .with_currency(config.currency);

        Self {
            service,
            gateway,
            config,
        }
    }
}

/// Read the first config file found, looking upwards from the working directory
fn read_config_file(name: &str) -> Option<(String, String)> {
    ["config", "../config", "../../config"]
        .iter()
        .map(|dir| format!("{}/{}", dir, name))
        .find_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path, content))
        })
}

/// Load product catalog from config/products.toml
fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    let Some((path, content)) = read_config_file("products.toml") else {
        tracing::warn!("No product catalog found, using empty catalog");
        return Ok(ProductCatalog::new());
    };

    let catalog = ProductCatalog::from_toml(&content)
        .with_context(|| format!("Failed to parse {}", path))?;
    tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
    Ok(catalog)
}

/// Load known accounts from config/accounts.toml
fn load_accounts() -> anyhow::Result<Vec<Account>> {
    let Some((path, content)) = read_config_file("accounts.toml") else {
        tracing::warn!("No accounts file found, every request will be rejected");
        return Ok(Vec::new());
    };

    let accounts =
        Account::list_from_toml(&content).with_context(|| format!("Failed to parse {}", path))?;
    tracing::info!("Loaded {} accounts from {}", accounts.len(), path);
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.currency, Currency::EUR);
        assert_eq!(config.reconcile_interval, Duration::from_secs(60));
        assert!(!config.is_production());
    }

    #[test]
    fn test_app_config_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "3000"),
            ("SHOP_CURRENCY", "usd"),
            ("RECONCILE_INTERVAL_SECS", "15"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.currency, Currency::USD);
        assert_eq!(config.reconcile_interval, Duration::from_secs(15));
        assert!(config.is_production());
    }

    #[test]
    fn test_app_config_rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("SHOP_CURRENCY", "btc")])).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::from_lookup(lookup(&[("PORT", "3000")])).unwrap();
        config.host = "0.0.0.0".to_string();

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        config.host = "not a host".to_string();
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_bundled_config_files_parse() {
        let catalog =
            ProductCatalog::from_toml(include_str!("../../../config/products.toml")).unwrap();
        assert!(catalog.active_products().count() >= 1);
        assert!(catalog.products.iter().any(|p| !p.active));
        assert!(catalog.ensure_currency(Currency::default()).is_ok());
        assert!(catalog.ensure_currency(Currency::USD).is_err());

        let accounts =
            Account::list_from_toml(include_str!("../../../config/accounts.toml")).unwrap();
        assert!(accounts.iter().any(|a| a.is_deferred()));
        assert!(accounts.iter().any(|a| !a.is_deferred()));
        assert!(accounts.iter().all(|a| a.profile.validate().is_ok()));
    }
}
