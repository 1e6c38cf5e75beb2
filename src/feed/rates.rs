use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::Config;
use crate::logging::{self, obj, v_num, v_str, Domain};

/// Rates used whenever the live fetch fails, in units per USD.
pub const FALLBACK_RATES: [(&str, f64); 4] =
    [("HUF", 355.0), ("TRY", 31.0), ("BRL", 5.1), ("IRR", 42000.0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOrigin {
    Live,
    Fallback,
}

/// Currency code -> units per USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
    origin: RateOrigin,
}

impl RateTable {
    pub fn live(rates: HashMap<String, f64>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
            origin: RateOrigin::Live,
        }
    }

    pub fn fallback() -> Self {
        Self {
            rates: FALLBACK_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
            origin: RateOrigin::Fallback,
        }
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn rate_or(&self, code: &str, default: f64) -> f64 {
        self.get(code).unwrap_or(default)
    }

    pub fn origin(&self) -> RateOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Why a live fetch did not produce a table. Every kind maps to the fallback.
#[derive(Debug, Error, PartialEq)]
pub enum RateError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload has no `rates` field")]
    MissingRates,
    #[error("request failed: {0}")]
    Request(String),
}

impl RateError {
    pub fn kind(&self) -> &'static str {
        match self {
            RateError::Connect(_) => "connect",
            RateError::Timeout => "timeout",
            RateError::Status(_) => "status",
            RateError::Malformed(_) => "malformed",
            RateError::MissingRates => "missing_rates",
            RateError::Request(_) => "request",
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RateError::Timeout
        } else if err.is_connect() {
            RateError::Connect(err.to_string())
        } else if err.is_decode() || err.is_body() {
            RateError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RateError::Status(status.as_u16())
        } else {
            RateError::Request(err.to_string())
        }
    }
}

/// Parse a provider body of the form `{"rates": {"HUF": 355.1, ...}}`.
pub fn parse_rates(body: &str) -> Result<HashMap<String, f64>, RateError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| RateError::Malformed(e.to_string()))?;
    let rates = value.get("rates").ok_or(RateError::MissingRates)?;
    serde_json::from_value(rates.clone()).map_err(|e| RateError::Malformed(e.to_string()))
}

#[async_trait]
pub trait RateSource {
    async fn fetch(&self) -> Result<HashMap<String, f64>, RateError>;
}

/// Single GET against a USD-based rate provider.
pub struct HttpRateSource {
    client: Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.rates_url, cfg.rates_timeout())
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self) -> Result<HashMap<String, f64>, RateError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(RateError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(RateError::from_reqwest)?;
        parse_rates(&body)
    }
}

/// One fetch attempt; any failure yields [`RateTable::fallback`]. No retry.
pub async fn fetch_exchange_rates(source: &(dyn RateSource + Send + Sync)) -> RateTable {
    match source.fetch().await {
        Ok(rates) => {
            logging::info(
                Domain::Rates,
                "rates_fetched",
                obj(&[("count", v_num(rates.len() as f64))]),
            );
            RateTable::live(rates)
        }
        Err(err) => {
            logging::warn(
                Domain::Rates,
                "rates_fallback",
                obj(&[
                    ("msg", v_str("live rates unavailable, using fallback table")),
                    ("reason", v_str(err.kind())),
                    ("detail", v_str(&err.to_string())),
                ]),
            );
            RateTable::fallback()
        }
    }
}

#[derive(Debug, Clone)]
struct CachedRates {
    table: RateTable,
    fetched_at: Instant,
}

impl CachedRates {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Process-lifetime cache in front of a [`RateSource`].
///
/// A fallback table is cached the same as a live one, so a failed fetch is not
/// retried until the TTL runs out.
pub struct RateFetcher {
    source: Box<dyn RateSource + Send + Sync>,
    ttl: Duration,
    cache: Mutex<Option<CachedRates>>,
}

impl RateFetcher {
    pub fn new(source: Box<dyn RateSource + Send + Sync>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(Box::new(HttpRateSource::from_config(cfg)), cfg.rates_ttl())
    }

    pub async fn rates(&self) -> RateTable {
        if let Some(table) = self.cached() {
            return table;
        }
        let table = fetch_exchange_rates(self.source.as_ref()).await;
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(CachedRates {
                table: table.clone(),
                fetched_at: Instant::now(),
            });
        }
        table
    }

    fn cached(&self) -> Option<RateTable> {
        let cache = self.cache.lock().ok()?;
        let fresh = cache
            .as_ref()
            .filter(|c| c.is_fresh(self.ttl))
            .map(|c| c.table.clone());
        fresh
    }

    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubSource {
        result: Result<HashMap<String, f64>, RateError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RateSource for StubSource {
        async fn fetch(&self) -> Result<HashMap<String, f64>, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(r) => Ok(r.clone()),
                Err(RateError::Timeout) => Err(RateError::Timeout),
                Err(RateError::Status(s)) => Err(RateError::Status(*s)),
                Err(RateError::MissingRates) => Err(RateError::MissingRates),
                Err(e) => Err(RateError::Connect(e.to_string())),
            }
        }
    }

    fn stub(result: Result<HashMap<String, f64>, RateError>) -> (StubSource, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            StubSource {
                result,
                calls: calls.clone(),
            },
            calls,
        )
    }

    /// Serve one canned HTTP response on an ephemeral port.
    fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/latest?from=USD", addr)
    }

    /// Accept one connection, read the request, then hold the socket without answering.
    fn serve_silent(hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                std::thread::sleep(hold);
            }
        });
        format!("http://{}/latest?from=USD", addr)
    }

    fn expected_fallback() -> BTreeMap<String, f64> {
        [("HUF", 355.0), ("TRY", 31.0), ("BRL", 5.1), ("IRR", 42000.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn fallback_table_is_exact() {
        let table = RateTable::fallback();
        assert_eq!(table.rates, expected_fallback());
        assert_eq!(table.origin(), RateOrigin::Fallback);
        assert_eq!(table.rate_or("ZWL", 1.0), 1.0);
    }

    #[test]
    fn parse_rates_distinguishes_failures() {
        let ok = parse_rates(r#"{"amount":1.0,"base":"USD","rates":{"HUF":360.5,"EUR":0.92}}"#).unwrap();
        assert_eq!(ok.get("HUF"), Some(&360.5));
        assert_eq!(parse_rates(r#"{"base":"USD"}"#), Err(RateError::MissingRates));
        assert!(matches!(parse_rates("<html>"), Err(RateError::Malformed(_))));
        assert!(matches!(
            parse_rates(r#"{"rates":{"HUF":"lots"}}"#),
            Err(RateError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn every_failure_kind_maps_to_fallback() {
        for err in [
            RateError::Timeout,
            RateError::Status(503),
            RateError::MissingRates,
            RateError::Connect("refused".into()),
        ] {
            let (source, _) = stub(Err(err));
            let table = fetch_exchange_rates(&source).await;
            assert_eq!(table, RateTable::fallback());
        }
    }

    #[tokio::test]
    async fn live_rates_pass_through() {
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), 0.92);
        let (source, _) = stub(Ok(rates));
        let table = fetch_exchange_rates(&source).await;
        assert_eq!(table.origin(), RateOrigin::Live);
        assert_eq!(table.get("EUR"), Some(0.92));
        assert_eq!(table.get("HUF"), None);
    }

    #[tokio::test]
    async fn fetcher_caches_within_ttl() {
        let (source, calls) = stub(Err(RateError::Timeout));
        let fetcher = RateFetcher::new(Box::new(source), Duration::from_secs(3600));
        let a = fetcher.rates().await;
        let b = fetcher.rates().await;
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        fetcher.invalidate();
        fetcher.rates().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetcher_refetches_after_ttl() {
        let (source, calls) = stub(Ok(HashMap::new()));
        let fetcher = RateFetcher::new(Box::new(source), Duration::ZERO);
        fetcher.rates().await;
        fetcher.rates().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_source_reads_rates() {
        let url = serve_once("200 OK", r#"{"base":"USD","rates":{"TRY":32.4}}"#);
        let source = HttpRateSource::new(&url, Duration::from_secs(5));
        let rates = source.fetch().await.unwrap();
        assert_eq!(rates.get("TRY"), Some(&32.4));
    }

    #[tokio::test]
    async fn http_source_reports_status_and_malformed_body() {
        let url = serve_once("503 Service Unavailable", "{}");
        let source = HttpRateSource::new(&url, Duration::from_secs(5));
        assert_eq!(source.fetch().await, Err(RateError::Status(503)));

        let url = serve_once("200 OK", "not json");
        let source = HttpRateSource::new(&url, Duration::from_secs(5));
        assert!(matches!(source.fetch().await, Err(RateError::Malformed(_))));
    }

    #[tokio::test]
    async fn http_source_reports_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpRateSource::new(&format!("http://{}/", addr), Duration::from_secs(5));
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, RateError::Connect(_)), "got {:?}", err);
        assert_eq!(fetch_exchange_rates(&source).await, RateTable::fallback());
    }

    #[tokio::test]
    async fn http_source_reports_timeout_on_silent_provider() {
        let url = serve_silent(Duration::from_secs(3));
        let source = HttpRateSource::new(&url, Duration::from_millis(200));
        assert_eq!(source.fetch().await, Err(RateError::Timeout));
        assert_eq!(fetch_exchange_rates(&source).await, RateTable::fallback());
    }
}
