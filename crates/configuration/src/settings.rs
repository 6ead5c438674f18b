use core_types::AccountKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub accounts: Accounts,
    pub pricing: Pricing,
    pub logging: Logging,
}

/// Account policies for the two books. Keys missing from a book's section
/// keep that book's default.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "AccountsFile")]
pub struct Accounts {
    pub live: PolicySettings,
    pub paper: PolicySettings,
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            live: PolicySettings {
                starting_cash: dec!(10000),
                auto_create: false,
            },
            paper: PolicySettings {
                starting_cash: dec!(100000),
                auto_create: true,
            },
        }
    }
}

impl Accounts {
    /// Resolves the full policy for one book.
    pub fn policy(&self, kind: AccountKind) -> AccountPolicy {
        let settings = match kind {
            AccountKind::Live => &self.live,
            AccountKind::Paper => &self.paper,
        };
        AccountPolicy {
            kind,
            starting_cash: settings.starting_cash,
            auto_create: settings.auto_create,
        }
    }
}

/// `[accounts]` as written in the file, every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccountsFile {
    live: PolicyOverrides,
    paper: PolicyOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyOverrides {
    starting_cash: Option<Decimal>,
    auto_create: Option<bool>,
}

impl PolicyOverrides {
    fn over(self, defaults: PolicySettings) -> PolicySettings {
        PolicySettings {
            starting_cash: self.starting_cash.unwrap_or(defaults.starting_cash),
            auto_create: self.auto_create.unwrap_or(defaults.auto_create),
        }
    }
}

impl From<AccountsFile> for Accounts {
    fn from(file: AccountsFile) -> Self {
        let defaults = Accounts::default();
        Self {
            live: file.live.over(defaults.live),
            paper: file.paper.over(defaults.paper),
        }
    }
}

/// Per-book settings as they appear in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    /// Cash credited to a newly created account.
    pub starting_cash: Decimal,
    /// When true a missing account is created on first lookup; when false the
    /// lookup fails and the account must be opened explicitly.
    pub auto_create: bool,
}

/// How the account manager treats lookups for one book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPolicy {
    pub kind: AccountKind,
    pub starting_cash: Decimal,
    pub auto_create: bool,
}

impl AccountPolicy {
    /// Paper-trading policy: accounts appear on first use.
    pub fn paper(starting_cash: Decimal) -> Self {
        Self {
            kind: AccountKind::Paper,
            starting_cash,
            auto_create: true,
        }
    }

    /// Live policy: accounts must already exist.
    pub fn strict(starting_cash: Decimal) -> Self {
        Self {
            kind: AccountKind::Live,
            starting_cash,
            auto_create: false,
        }
    }
}

/// Settings for the price oracle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pricing {
    /// Price used for a symbol with neither feed data nor a fallback entry.
    pub default_price: Decimal,
    /// How long a current price stays cached, in seconds. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Static per-symbol prices used when the feed has no data.
    pub fallback_prices: HashMap<String, Decimal>,
    /// Bar interval of the `klines` rows the database feed reads.
    pub kline_interval: String,
}

impl Default for Pricing {
    fn default() -> Self {
        let fallback_prices = [
            ("AAPL", dec!(220)),
            ("GOOG", dec!(2800)),
            ("MSFT", dec!(420)),
            ("TSLA", dec!(250)),
            ("WMT", dec!(165)),
            ("UL", dec!(48)),
            ("IBM", dec!(190)),
        ]
        .into_iter()
        .map(|(symbol, price)| (symbol.to_string(), price))
        .collect();

        Self {
            default_price: dec!(100),
            cache_ttl_secs: 5,
            fallback_prices,
            kline_interval: "1d".to_string(),
        }
    }
}

/// Settings for the tracing subscriber.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Output style of the console log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}
