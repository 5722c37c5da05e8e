//! Bot configuration and the strategy context derived from it.
//!
//! The config file is TOML (JSON when the path ends in `.json`, the format
//! older deployments used). Unknown keys are rejected, required keys have no
//! default, and `validate` runs once before anything trades.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

/// Kline intervals the exchange accepts.
pub const VALID_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("missing exchange credentials: set `{0}` in the config or the environment")]
    MissingCredentials(&'static str),
}

/// Enable flag and entry/exit roles of an optional indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorConfig<P> {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub for_entry: bool,
    #[serde(default)]
    pub for_exit: bool,
    #[serde(default)]
    pub params: P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlligatorParams {
    pub jaw_period: usize,
    pub teeth_period: usize,
    pub lips_period: usize,
}

impl Default for AlligatorParams {
    fn default() -> Self {
        Self {
            jaw_period: 13,
            teeth_period: 8,
            lips_period: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Everything the `dcabot` binary reads from its config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    pub symbols: Vec<String>,
    pub base_investment: f64,
    pub max_dca_levels: u32,
    pub take_profit: f64,
    pub trailing_stop: f64,
    pub dca_drop_trigger: f64,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_rsi_threshold")]
    pub rsi_threshold: f64,
    /// Quote asset funding the buys (e.g. "USDT").
    pub base_currency: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Growth factor of the DCA order size per level (1.0 keeps it fixed).
    #[serde(default = "default_dca_size_multiplier")]
    pub dca_size_multiplier: f64,
    /// Decimals kept when rounding order quantities down.
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default)]
    pub journal_file: Option<PathBuf>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub alligator: IndicatorConfig<AlligatorParams>,
    #[serde(default)]
    pub macd: IndicatorConfig<MacdParams>,
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_threshold() -> f64 {
    30.0
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_fee_rate() -> f64 {
    0.001
}

fn default_dca_size_multiplier() -> f64 {
    1.0
}

fn default_quantity_precision() -> u32 {
    6
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_state_file() -> PathBuf {
    PathBuf::from("trades.json")
}

/// API key pair for signed exchange endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl BotConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str::<Self>(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            toml::from_str::<Self>(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.symbols.is_empty() {
            return invalid("`symbols` must list at least one symbol".into());
        }
        if let Some(blank) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            return invalid(format!("`symbols` contains a blank entry: {blank:?}"));
        }
        if !(self.base_investment.is_finite() && self.base_investment > 0.0) {
            return invalid(format!(
                "`base_investment` must be > 0, got {}",
                self.base_investment
            ));
        }
        if !(self.take_profit.is_finite() && self.take_profit > 0.0) {
            return invalid(format!("`take_profit` must be > 0, got {}", self.take_profit));
        }
        if !(self.trailing_stop > 0.0 && self.trailing_stop < 1.0) {
            return invalid(format!(
                "`trailing_stop` must be in (0, 1), got {}",
                self.trailing_stop
            ));
        }
        if !(self.dca_drop_trigger > 0.0 && self.dca_drop_trigger < 1.0) {
            return invalid(format!(
                "`dca_drop_trigger` must be in (0, 1), got {}",
                self.dca_drop_trigger
            ));
        }
        if self.max_dca_levels == 0 {
            return invalid("`max_dca_levels` must be >= 1 (the entry is the first level)".into());
        }
        if self.max_dca_levels as f64 * self.dca_drop_trigger >= 1.0 {
            return invalid(format!(
                "`max_dca_levels` x `dca_drop_trigger` must stay below 1, got {} x {}",
                self.max_dca_levels, self.dca_drop_trigger
            ));
        }
        if self.rsi_period == 0 {
            return invalid("`rsi_period` must be >= 1".into());
        }
        if !(0.0..=100.0).contains(&self.rsi_threshold) {
            return invalid(format!(
                "`rsi_threshold` must be in [0, 100], got {}",
                self.rsi_threshold
            ));
        }
        if self.base_currency.trim().is_empty() {
            return invalid("`base_currency` must not be empty".into());
        }
        if !VALID_INTERVALS.contains(&self.interval.as_str()) {
            return invalid(format!(
                "`interval` {:?} is not one of {}",
                self.interval,
                VALID_INTERVALS.join(", ")
            ));
        }
        if !(self.fee_rate >= 0.0 && self.fee_rate < 1.0) {
            return invalid(format!("`fee_rate` must be in [0, 1), got {}", self.fee_rate));
        }
        if !(self.dca_size_multiplier.is_finite() && self.dca_size_multiplier > 0.0) {
            return invalid(format!(
                "`dca_size_multiplier` must be > 0, got {}",
                self.dca_size_multiplier
            ));
        }
        if self.quantity_precision > 12 {
            return invalid(format!(
                "`quantity_precision` must be <= 12, got {}",
                self.quantity_precision
            ));
        }
        if self.poll_interval_secs == 0 {
            return invalid("`poll_interval_secs` must be >= 1".into());
        }

        let a = &self.alligator.params;
        if a.jaw_period == 0 || a.teeth_period == 0 || a.lips_period == 0 {
            return invalid("alligator periods must be >= 1".into());
        }
        if self.alligator.enabled && !(a.lips_period < a.teeth_period && a.teeth_period < a.jaw_period)
        {
            return invalid(format!(
                "alligator periods must satisfy lips < teeth < jaw, got {}/{}/{}",
                a.lips_period, a.teeth_period, a.jaw_period
            ));
        }

        let m = &self.macd.params;
        if m.fast == 0 || m.slow == 0 || m.signal == 0 {
            return invalid("macd periods must be >= 1".into());
        }
        if self.macd.enabled && m.fast >= m.slow {
            return invalid(format!(
                "macd `fast` must be < `slow`, got {} >= {}",
                m.fast, m.slow
            ));
        }

        Ok(())
    }

    /// Read-only tunables for the state machine.
    pub fn strategy_context(&self) -> StrategyContext {
        StrategyContext {
            base_investment: self.base_investment,
            max_dca_levels: self.max_dca_levels,
            take_profit: self.take_profit,
            trailing_stop: self.trailing_stop,
            dca_drop_trigger: self.dca_drop_trigger,
            dca_size_multiplier: self.dca_size_multiplier,
            rsi_period: self.rsi_period,
            rsi_threshold: self.rsi_threshold,
            fee_rate: self.fee_rate,
            quantity_precision: self.quantity_precision,
        }
    }

    /// Resolve exchange credentials; environment values win over the file.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_from(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(API_SECRET_ENV).ok(),
        )
    }

    pub fn credentials_from(
        &self,
        env_key: Option<String>,
        env_secret: Option<String>,
    ) -> Result<Credentials, ConfigError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let api_key = non_empty(env_key)
            .or_else(|| non_empty(self.api_key.clone()))
            .ok_or(ConfigError::MissingCredentials(API_KEY_ENV))?;
        let api_secret = non_empty(env_secret)
            .or_else(|| non_empty(self.api_secret.clone()))
            .ok_or(ConfigError::MissingCredentials(API_SECRET_ENV))?;
        Ok(Credentials {
            api_key,
            api_secret,
        })
    }

    /// State file for paper sessions, next to `state_file`:
    /// `trades.json` becomes `trades.paper.json`.
    pub fn paper_state_file(&self) -> PathBuf {
        let stem = self
            .state_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trades".to_string());
        let ext = self
            .state_file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        self.state_file.with_file_name(format!("{stem}.paper.{ext}"))
    }

    /// Deterministic hash of every setting that influences decisions.
    ///
    /// Two runs with the same fingerprint trade identically on the same
    /// prices; paths, poll cadence and credentials are excluded.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Fingerprinted<'a> {
            symbols: &'a [String],
            interval: &'a str,
            base_currency: &'a str,
            context: StrategyContext,
            alligator: &'a IndicatorConfig<AlligatorParams>,
            macd: &'a IndicatorConfig<MacdParams>,
        }

        let payload = Fingerprinted {
            symbols: &self.symbols,
            interval: &self.interval,
            base_currency: &self.base_currency,
            context: self.strategy_context(),
            alligator: &self.alligator,
            macd: &self.macd,
        };
        // Plain structs of numbers and strings always serialize.
        let json = serde_json::to_string(&payload).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Tunables the state machine reads but never mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext {
    /// Quote notional of the entry buy.
    pub base_investment: f64,
    /// Maximum buy fills per cycle, entry included.
    pub max_dca_levels: u32,
    pub take_profit: f64,
    pub trailing_stop: f64,
    pub dca_drop_trigger: f64,
    pub dca_size_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_threshold: f64,
    pub fee_rate: f64,
    pub quantity_precision: u32,
}

impl StrategyContext {
    /// Price at which the take-profit arms the trailing stop.
    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit)
    }

    /// DCA trigger for a position at `dca_level`: the drop compounds with the
    /// level and is measured from the anchor (first fill) price. Level 0
    /// records count as a single fill, so the first add always needs a full
    /// `dca_drop_trigger` drop.
    pub fn dca_trigger_price(&self, anchor_price: f64, dca_level: u32) -> f64 {
        anchor_price * (1.0 - self.dca_drop_trigger * dca_level.max(1) as f64)
    }

    /// Quote notional of the DCA add made from `dca_level`.
    pub fn dca_size_at_level(&self, dca_level: u32) -> f64 {
        self.base_investment * self.dca_size_multiplier.powi(dca_level as i32)
    }

    /// Round a quantity down to the configured number of decimals.
    pub fn round_quantity(&self, quantity: f64) -> f64 {
        let scale = 10f64.powi(self.quantity_precision as i32);
        // Nudge before flooring so 0.3 / 0.1 style results don't lose a step.
        ((quantity * scale) + 1e-9).floor() / scale
    }

    /// Fee charged on a notional.
    pub fn fee_on(&self, notional: f64) -> f64 {
        self.fee_rate * notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
symbols = ["BTCUSDT", "ETHUSDT"]
base_investment = 100
max_dca_levels = 3
take_profit = 0.05
trailing_stop = 0.03
dca_drop_trigger = 0.05
base_currency = "USDT"
"#;

    fn minimal() -> BotConfig {
        BotConfig::from_toml_str(MINIMAL).unwrap()
    }

    #[test]
    fn parse_minimal_config_with_defaults() {
        let config = minimal();
        assert_eq!(config.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.base_investment, 100.0);
        assert_eq!(config.rsi_period, 14);
        assert_eq!(config.rsi_threshold, 30.0);
        assert_eq!(config.interval, "1h");
        assert_eq!(config.fee_rate, 0.001);
        assert_eq!(config.state_file, PathBuf::from("trades.json"));
        assert!(!config.alligator.enabled);
        assert!(!config.macd.enabled);
        assert_eq!(config.macd.params, MacdParams::default());
    }

    #[test]
    fn parse_indicator_blocks() {
        let toml_str = format!(
            "{MINIMAL}\n[macd]\nenabled = true\nfor_entry = true\n[macd.params]\nfast = 5\nslow = 13\nsignal = 4\n\n[alligator]\nenabled = true\nfor_exit = true\n"
        );
        let config = BotConfig::from_toml_str(&toml_str).unwrap();
        assert!(config.macd.enabled && config.macd.for_entry && !config.macd.for_exit);
        assert_eq!(
            config.macd.params,
            MacdParams {
                fast: 5,
                slow: 13,
                signal: 4
            }
        );
        assert!(config.alligator.for_exit);
        assert_eq!(config.alligator.params, AlligatorParams::default());
    }

    #[test]
    fn missing_required_key_is_parse_error() {
        let toml_str = MINIMAL.replace("take_profit = 0.05\n", "");
        let err = BotConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
        assert!(err.to_string().contains("take_profit"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let toml_str = format!("{MINIMAL}take_proft = 0.1\n");
        assert!(matches!(
            BotConfig::from_toml_str(&toml_str),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let cases = [
            ("base_investment = 100", "base_investment = 0"),
            ("take_profit = 0.05", "take_profit = -0.05"),
            ("trailing_stop = 0.03", "trailing_stop = 1.5"),
            ("dca_drop_trigger = 0.05", "dca_drop_trigger = 0"),
            ("symbols = [\"BTCUSDT\", \"ETHUSDT\"]", "symbols = []"),
            ("base_currency = \"USDT\"", "base_currency = \"\""),
            ("max_dca_levels = 3", "max_dca_levels = 0"),
            ("max_dca_levels = 3", "max_dca_levels = 20"),
        ];
        for (from, to) in cases {
            let toml_str = MINIMAL.replace(from, to);
            let err = BotConfig::from_toml_str(&toml_str).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{to}: {err}");
        }

        for extra in [
            "rsi_threshold = 120",
            "rsi_period = 0",
            "interval = \"7m\"",
            "fee_rate = 1.0",
            "dca_size_multiplier = 0",
        ] {
            let toml_str = format!("{MINIMAL}{extra}\n");
            let err = BotConfig::from_toml_str(&toml_str).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{extra}: {err}");
        }
    }

    #[test]
    fn enabled_macd_requires_fast_below_slow() {
        let toml_str =
            format!("{MINIMAL}[macd]\nenabled = true\n[macd.params]\nfast = 26\nslow = 12\n");
        assert!(matches!(
            BotConfig::from_toml_str(&toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn json_config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "symbols": ["BTCUSDT"],
                "base_investment": 50,
                "max_dca_levels": 2,
                "take_profit": 0.04,
                "trailing_stop": 0.02,
                "dca_drop_trigger": 0.03,
                "rsi_period": 14,
                "rsi_threshold": 30,
                "base_currency": "USDT",
                "interval": "15m",
                "alligator": {"enabled": true, "for_entry": true, "for_exit": false}
            }"#,
        )
        .unwrap();
        let config = BotConfig::from_file(&path).unwrap();
        assert_eq!(config.interval, "15m");
        assert!(config.alligator.enabled);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = BotConfig::from_file(Path::new("/nonexistent/dcabot.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn credentials_prefer_environment() {
        let mut config = minimal();
        config.api_key = Some("file-key".into());
        config.api_secret = Some("file-secret".into());

        let creds = config
            .credentials_from(Some("env-key".into()), None)
            .unwrap();
        assert_eq!(creds.api_key, "env-key");
        assert_eq!(creds.api_secret, "file-secret");
        assert!(!format!("{creds:?}").contains("file-secret"));
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let config = minimal();
        let err = config.credentials_from(None, Some("s".into())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(API_KEY_ENV)));
    }

    #[test]
    fn fingerprint_tracks_strategy_settings_only() {
        let config = minimal();
        let mut moved = config.clone();
        moved.state_file = PathBuf::from("elsewhere.json");
        moved.poll_interval_secs = 5;
        assert_eq!(config.fingerprint(), moved.fingerprint());

        let mut tuned = config.clone();
        tuned.take_profit = 0.06;
        assert_ne!(config.fingerprint(), tuned.fingerprint());
    }

    #[test]
    fn paper_state_lives_beside_live_state() {
        let mut config = minimal();
        assert_eq!(config.paper_state_file(), PathBuf::from("trades.paper.json"));

        config.state_file = PathBuf::from("/var/lib/dcabot/state");
        assert_eq!(
            config.paper_state_file(),
            PathBuf::from("/var/lib/dcabot/state.paper.json")
        );
        assert_ne!(config.paper_state_file(), config.state_file);
    }

    #[test]
    fn context_policies() {
        let ctx = minimal().strategy_context();
        assert!((ctx.take_profit_price(100.0) - 105.0).abs() < 1e-12);
        assert!((ctx.dca_trigger_price(100.0, 1) - 95.0).abs() < 1e-12);
        assert!((ctx.dca_trigger_price(100.0, 2) - 90.0).abs() < 1e-12);
        assert_eq!(ctx.dca_trigger_price(100.0, 0), ctx.dca_trigger_price(100.0, 1));
        assert_eq!(ctx.dca_size_at_level(3), 100.0);
        assert_eq!(ctx.round_quantity(1.23456789), 1.234567);
        assert_eq!(ctx.round_quantity(0.3 / 0.1), 3.0);
    }

    #[test]
    fn doubling_multiplier_grows_dca_size() {
        let mut config = minimal();
        config.dca_size_multiplier = 2.0;
        let ctx = config.strategy_context();
        assert_eq!(ctx.dca_size_at_level(0), 100.0);
        assert_eq!(ctx.dca_size_at_level(1), 200.0);
        assert_eq!(ctx.dca_size_at_level(2), 400.0);
    }
}
