//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `AULA_SEGURA` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use aula_segura::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod auth;
mod cron;
mod database;
mod email;
mod error;
mod mercadopago;
mod paypal;
mod server;

pub use auth::AuthConfig;
pub use cron::CronConfig;
pub use database::DatabaseConfig;
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use mercadopago::MercadoPagoConfig;
pub use paypal::{PayPalConfig, PayPalMode};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the Aula Segura billing backend.
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, public base URL)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Authentication configuration (JWT bearer tokens)
    pub auth: AuthConfig,

    /// PayPal configuration (REST API + webhook id)
    pub paypal: PayPalConfig,

    /// MercadoPago configuration (access token + webhook secret)
    pub mercadopago: MercadoPagoConfig,

    /// Email configuration (Resend)
    pub email: EmailConfig,

    /// CRON reconciliation endpoint configuration
    pub cron: CronConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AULA_SEGURA` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AULA_SEGURA__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `AULA_SEGURA__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AULA_SEGURA")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()?;
        self.paypal.validate()?;
        self.mercadopago.validate()?;
        self.email.validate()?;
        self.cron.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "AULA_SEGURA__DATABASE__URL",
            "postgresql://test@localhost/test",
        );
        env::set_var("AULA_SEGURA__AUTH__JWT_SECRET", "x".repeat(48));
        env::set_var("AULA_SEGURA__PAYPAL__CLIENT_ID", "AYclient");
        env::set_var("AULA_SEGURA__PAYPAL__CLIENT_SECRET", "EKsecret");
        env::set_var("AULA_SEGURA__PAYPAL__WEBHOOK_ID", "8PT597110X687430LK");
        env::set_var("AULA_SEGURA__MERCADOPAGO__ACCESS_TOKEN", "APP_USR-token");
        env::set_var("AULA_SEGURA__MERCADOPAGO__WEBHOOK_SECRET", "mp-secret");
        env::set_var("AULA_SEGURA__EMAIL__RESEND_API_KEY", "re_xxx");
        env::set_var("AULA_SEGURA__CRON__SECRET", "cron-secret-0123456789");
    }

    fn clear_env() {
        for key in [
            "AULA_SEGURA__DATABASE__URL",
            "AULA_SEGURA__AUTH__JWT_SECRET",
            "AULA_SEGURA__PAYPAL__CLIENT_ID",
            "AULA_SEGURA__PAYPAL__CLIENT_SECRET",
            "AULA_SEGURA__PAYPAL__WEBHOOK_ID",
            "AULA_SEGURA__MERCADOPAGO__ACCESS_TOKEN",
            "AULA_SEGURA__MERCADOPAGO__WEBHOOK_SECRET",
            "AULA_SEGURA__EMAIL__RESEND_API_KEY",
            "AULA_SEGURA__CRON__SECRET",
            "AULA_SEGURA__SERVER__PORT",
            "AULA_SEGURA__SERVER__ENVIRONMENT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok());
        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("AULA_SEGURA__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
