use crate::error::ConfigError;
use crate::settings::Config;
use rust_decimal::Decimal;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{AccountPolicy, Accounts, LogFormat, Logging, PolicySettings, Pricing};

/// Loads the application configuration.
///
/// Built-in defaults are overlaid with the TOML file at `path` (optional) and
/// then with `LEDGER__`-prefixed environment variables, e.g.
/// `LEDGER__ACCOUNTS__PAPER__STARTING_CASH=50000`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("LEDGER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;

    // Key case is not guaranteed to survive the source merge.
    config.pricing.fallback_prices = config
        .pricing
        .fallback_prices
        .into_iter()
        .map(|(symbol, price)| (core_types::normalize_symbol(&symbol), price))
        .collect();

    validate(&config)?;
    Ok(config)
}

/// Rejects settings the engine cannot run with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    for (book, settings) in [("live", &config.accounts.live), ("paper", &config.accounts.paper)] {
        if settings.starting_cash.is_sign_negative() {
            return Err(ConfigError::ValidationError(format!(
                "accounts.{}.starting_cash must not be negative",
                book
            )));
        }
    }
    if config.pricing.default_price <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "pricing.default_price must be greater than 0".to_string(),
        ));
    }
    if let Some((symbol, _)) = config
        .pricing
        .fallback_prices
        .iter()
        .find(|(_, price)| **price <= Decimal::ZERO)
    {
        return Err(ConfigError::ValidationError(format!(
            "pricing.fallback_prices.{} must be greater than 0",
            symbol
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AccountKind;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_the_two_books() {
        let config = Config::default();
        let live = config.accounts.policy(AccountKind::Live);
        let paper = config.accounts.policy(AccountKind::Paper);
        assert_eq!(live.starting_cash, dec!(10000));
        assert!(!live.auto_create);
        assert_eq!(paper.starting_cash, dec!(100000));
        assert!(paper.auto_create);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.pricing.default_price, dec!(100));
        assert_eq!(config.pricing.fallback_prices.get("AAPL"), Some(&dec!(220)));
    }

    #[test]
    fn partial_book_sections_keep_their_own_defaults() {
        let toml = r#"
            [accounts.live]
            starting_cash = "25000"

            [accounts.paper]
            auto_create = false
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let live = config.accounts.policy(AccountKind::Live);
        assert_eq!(live.starting_cash, dec!(25000));
        assert!(!live.auto_create);
        let paper = config.accounts.policy(AccountKind::Paper);
        assert_eq!(paper.starting_cash, dec!(100000));
        assert!(!paper.auto_create);
    }

    #[test]
    fn negative_starting_cash_is_rejected() {
        let mut config = Config::default();
        config.accounts.paper.starting_cash = dec!(-1);
        assert!(matches!(validate(&config), Err(ConfigError::ValidationError(_))));
    }
}
