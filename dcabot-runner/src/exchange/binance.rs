//! Binance spot REST client.
//!
//! Public klines feed the price window; signed endpoints place market orders
//! and read the quote balance. Signed requests carry an HMAC-SHA256 of the
//! query string and the `X-MBX-APIKEY` header.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use dcabot_core::config::Credentials;
use dcabot_core::data::{FetchError, PriceSource};
use dcabot_core::domain::{Fill, OrderSide, PriceBar};
use dcabot_core::execution::{OrderError, OrderGateway};

use super::circuit_breaker::CircuitBreaker;

type HmacSha256 = Hmac<Sha256>;

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const BINANCE_TESTNET_URL: &str = "https://testnet.binance.vision";

const RECV_WINDOW_MS: u64 = 5_000;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance error payload: `{"code": -1121, "msg": "Invalid symbol."}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    #[serde(default)]
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
    #[serde(default)]
    transact_time: Option<i64>,
    #[serde(default)]
    fills: Vec<OrderFill>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderFill {
    price: String,
    qty: String,
    commission: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
}

pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    circuit_breaker: Arc<CircuitBreaker>,
    quantity_precision: u32,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("dcabot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            circuit_breaker,
            quantity_precision: 6,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Enable signed endpoints (orders, balances).
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Decimals used when sending order quantities.
    pub fn with_quantity_precision(mut self, precision: u32) -> Self {
        self.quantity_precision = precision;
        self
    }

    /// Retries for public GETs (orders are never retried).
    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    fn klines_url(&self, symbol: &str, interval: &str, limit: usize) -> String {
        // The endpoint caps `limit` at 1000.
        let limit = limit.clamp(1, 1000);
        format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        )
    }

    /// GET a public endpoint with retry and circuit breaker logic.
    fn get_with_retry(&self, url: &str) -> Result<String, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitOpen);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(FetchError::CircuitOpen);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if is_ban(status) {
                        self.circuit_breaker.trip();
                        warn!(%status, "exchange refused requests; circuit breaker tripped");
                        return Err(FetchError::CircuitOpen);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    let body = resp
                        .text()
                        .map_err(|e| FetchError::Malformed(format!("unreadable body: {e}")))?;

                    if status.is_client_error() {
                        return Err(FetchError::Api {
                            status: status.as_u16(),
                            message: api_message(&body),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(FetchError::Api {
                            status: status.as_u16(),
                            message: api_message(&body),
                        });
                        continue;
                    }

                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::Unreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::Unreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Unreachable("max retries exceeded".into())))
    }

    /// Send a signed request once and return the response body.
    fn send_signed(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, OrderError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| OrderError::Rejected("no API credentials configured".into()))?;

        if !self.circuit_breaker.is_allowed() {
            return Err(OrderError::CircuitOpen);
        }

        let mut query = encode_params(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={RECV_WINDOW_MS}&timestamp={}",
            Utc::now().timestamp_millis()
        ));
        let signature = sign(&credentials.api_secret, &query)?;
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let resp = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .map_err(|e| {
                self.circuit_breaker.record_failure();
                OrderError::Transport(e.to_string())
            })?;

        let status = resp.status();
        if is_ban(status) {
            self.circuit_breaker.trip();
            warn!(%status, "exchange refused signed request; circuit breaker tripped");
            return Err(OrderError::CircuitOpen);
        }

        let body = resp
            .text()
            .map_err(|e| OrderError::Transport(format!("unreadable body: {e}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            return Err(OrderError::Transport(format!(
                "rate limited: {}",
                api_message(&body)
            )));
        }
        if status.is_client_error() {
            return Err(OrderError::Rejected(api_message(&body)));
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(OrderError::Transport(format!(
                "HTTP {status}: {}",
                api_message(&body)
            )));
        }

        self.circuit_breaker.record_success();
        Ok(body)
    }
}

impl PriceSource for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let url = self.klines_url(symbol, interval, limit);
        let body = self.get_with_retry(&url)?;
        let bars = parse_klines(&body)?;
        debug!(symbol, count = bars.len(), "fetched klines");
        Ok(bars)
    }
}

impl OrderGateway for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn submit_market_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<Fill, OrderError> {
        let quantity = format_quantity(quantity, self.quantity_precision);
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let body = self.send_signed(Method::POST, "/api/v3/order", &params)?;
        parse_order_response(&body)
    }

    fn quote_balance(&mut self, asset: &str) -> Result<Option<f64>, OrderError> {
        let body = self.send_signed(Method::GET, "/api/v3/account", &[])?;
        parse_free_balance(&body, asset)
    }
}

fn is_ban(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::IM_A_TEAPOT
}

/// Best-effort message from an error body.
fn api_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => format!("{} ({})", err.msg, err.code),
        Err(_) => body.chars().take(200).collect(),
    }
}

fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex HMAC-SHA256 of `payload` keyed with the API secret.
pub fn sign(secret: &str, payload: &str) -> Result<String, OrderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| OrderError::Rejected(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Quantity as the exchange expects it: fixed decimals, no trailing zeros.
pub fn format_quantity(quantity: f64, precision: u32) -> String {
    let s = format!("{:.*}", precision as usize, quantity);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Kline rows: `[open_time_ms, open, high, low, close, volume, ...]`.
pub fn parse_klines(body: &str) -> Result<Vec<PriceBar>, FetchError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("klines are not an array of rows: {e}")))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let open_ms = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| FetchError::Malformed(format!("row {i}: missing open time")))?;
            let close = row
                .get(4)
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::Malformed(format!("row {i}: missing close")))?
                .parse::<f64>()
                .map_err(|e| FetchError::Malformed(format!("row {i}: bad close: {e}")))?;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(open_ms)
                .ok_or_else(|| FetchError::Malformed(format!("row {i}: bad open time {open_ms}")))?;
            Ok(PriceBar::new(timestamp, close))
        })
        .collect()
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, OrderError> {
    value
        .parse::<f64>()
        .map_err(|e| OrderError::Malformed(format!("{field} {value:?}: {e}")))
}

/// Fill price is the quantity-weighted average of the partial fills and the
/// fee the sum of their commissions.
pub fn parse_order_response(body: &str) -> Result<Fill, OrderError> {
    let resp: OrderResponse = serde_json::from_str(body)
        .map_err(|e| OrderError::Malformed(format!("order response: {e}")))?;

    let executed = parse_decimal("executedQty", &resp.executed_qty)?;
    if executed <= 0.0 {
        return Err(OrderError::Rejected(format!(
            "order not filled (status {})",
            resp.status
        )));
    }

    let (price, quantity, fee) = if resp.fills.is_empty() {
        let quote = parse_decimal("cummulativeQuoteQty", &resp.cummulative_quote_qty)?;
        (quote / executed, executed, 0.0)
    } else {
        let mut qty_sum = 0.0;
        let mut notional = 0.0;
        let mut fee = 0.0;
        for fill in &resp.fills {
            let qty = parse_decimal("fills.qty", &fill.qty)?;
            qty_sum += qty;
            notional += parse_decimal("fills.price", &fill.price)? * qty;
            fee += parse_decimal("fills.commission", &fill.commission)?;
        }
        if qty_sum <= 0.0 {
            return Err(OrderError::Malformed("fills carry no quantity".into()));
        }
        (notional / qty_sum, qty_sum, fee)
    };

    let timestamp = resp
        .transact_time
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(Fill {
        price,
        quantity,
        fee,
        timestamp,
    })
}

/// Free balance of `asset`; `None` when the account does not list it.
pub fn parse_free_balance(body: &str, asset: &str) -> Result<Option<f64>, OrderError> {
    let account: AccountResponse = serde_json::from_str(body)
        .map_err(|e| OrderError::Malformed(format!("account response: {e}")))?;
    account
        .balances
        .iter()
        .find(|b| b.asset.eq_ignore_ascii_case(asset))
        .map(|b| parse_decimal("free", &b.free))
        .transpose()
}
