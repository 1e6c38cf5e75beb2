//! HTTP front-end. One connection at a time; every interaction re-renders.

use anyhow::Result;
use serde_json::json;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::dashboard::{render_html, DashboardQuery, DashboardView};
use crate::dataset::{historical_events, CurrencyEvent};
use crate::evaporation::Evaporation;
use crate::export::{to_csv, CSV_CONTENT_TYPE, CSV_FILE_NAME};
use crate::feed::rates::RateFetcher;
use crate::logging::{self, obj, v_num, v_str, Domain};

pub struct AppState {
    pub events: Vec<CurrencyEvent>,
    pub rates: RateFetcher,
    pub cfg: Config,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        Self {
            events: historical_events(),
            rates: RateFetcher::from_config(&cfg),
            cfg,
        }
    }

    pub fn with_fetcher(cfg: Config, rates: RateFetcher) -> Self {
        Self {
            events: historical_events(),
            rates,
            cfg,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Response {
    fn ok(content_type: &'static str, body: String) -> Self {
        Self {
            status: "200 OK",
            content_type,
            headers: Vec::new(),
            body,
        }
    }

    fn not_found() -> Self {
        Self {
            status: "404 NOT FOUND",
            content_type: "text/plain",
            headers: Vec::new(),
            body: "Not Found".to_string(),
        }
    }

    fn redirect(location: String) -> Self {
        Self {
            status: "303 See Other",
            content_type: "text/plain",
            headers: vec![("Location", location)],
            body: String::new(),
        }
    }

    pub fn to_http(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );
        for (k, v) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", k, v));
        }
        head.push_str("\r\n");
        head.push_str(&self.body);
        head
    }
}

fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// Route one request line, e.g. `GET /?alert=1 HTTP/1.1`.
pub async fn handle(request_line: &str, app: &AppState) -> Response {
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(m), Some(t)) => (m, t),
        _ => return Response::not_found(),
    };
    if method != "GET" {
        return Response {
            status: "405 Method Not Allowed",
            content_type: "text/plain",
            headers: vec![("Allow", "GET".to_string())],
            body: "Method Not Allowed".to_string(),
        };
    }

    let (path, query) = split_target(target);
    let mut q = DashboardQuery::from_query(query);
    q.evap_step_ms = app.cfg.evap_step_ms;

    match path {
        "/" | "/index.html" => {
            let view = build_view(app, &q).await;
            Response::ok("text/html; charset=utf-8", render_html(&view))
        }
        "/api/view" => {
            let view = build_view(app, &q).await;
            Response::ok("application/json", view.to_json())
        }
        "/toggle" => {
            let next = q.toggled();
            logging::info(
                Domain::View,
                "alert_toggled",
                obj(&[("mode", v_str(next.state.status()))]),
            );
            Response::redirect(format!("/?{}", next.to_query()))
        }
        "/api/evaporate" => {
            let steps: Vec<_> = Evaporation::new(q.amount).collect();
            Response::ok("application/json", json!(steps).to_string())
        }
        "/export.csv" => {
            let mut resp = Response::ok(CSV_CONTENT_TYPE, to_csv(&app.events));
            resp.headers.push((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", CSV_FILE_NAME),
            ));
            resp
        }
        "/api/health" => Response::ok("application/json", r#"{"status":"ok"}"#.to_string()),
        _ => Response::not_found(),
    }
}

async fn build_view(app: &AppState, q: &DashboardQuery) -> DashboardView {
    let rates = app.rates.rates().await;
    let mut rng = rand::thread_rng();
    DashboardView::build(&app.events, &rates, q, &mut rng)
}

/// Upper bound on the request line plus headers.
pub const MAX_REQUEST_BYTES: u64 = 8 * 1024;

/// Read the request line and drain the headers; the body is never used.
/// `Ok(None)` means the peer closed before sending anything.
async fn read_request_head<R: AsyncRead + Unpin>(reader: R) -> io::Result<Option<String>> {
    let mut lines = BufReader::new(reader.take(MAX_REQUEST_BYTES)).lines();
    let request_line = match lines.next_line().await? {
        Some(line) => line,
        None => return Ok(None),
    };
    loop {
        match lines.next_line().await? {
            Some(line) if line.is_empty() => return Ok(Some(request_line)),
            Some(_) => {}
            // Cap reached (or peer hung up) before the blank line.
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "request head incomplete or over size limit",
                ))
            }
        }
    }
}

/// Bind `cfg.bind_addr` and serve until the process exits.
pub async fn serve(app: AppState) -> Result<()> {
    let listener = TcpListener::bind(&app.cfg.bind_addr).await?;
    logging::info(
        Domain::Server,
        "listening",
        obj(&[("addr", v_str(&app.cfg.bind_addr))]),
    );
    serve_on(listener, app).await
}

/// Accept loop. Connections are served sequentially.
pub async fn serve_on(listener: TcpListener, app: AppState) -> Result<()> {
    let head_timeout = app.cfg.request_timeout();
    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                logging::warn(
                    Domain::Server,
                    "accept_failed",
                    obj(&[("msg", v_str(&err.to_string()))]),
                );
                continue;
            }
        };

        let (reader, mut writer) = stream.split();
        let request_line =
            match tokio::time::timeout(head_timeout, read_request_head(reader)).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => continue,
                Ok(Err(err)) => {
                    logging::warn(
                        Domain::Server,
                        "bad_request",
                        obj(&[
                            ("peer", v_str(&peer.to_string())),
                            ("msg", v_str(&err.to_string())),
                        ]),
                    );
                    continue;
                }
                Err(_) => {
                    logging::warn(
                        Domain::Server,
                        "request_timeout",
                        obj(&[
                            ("peer", v_str(&peer.to_string())),
                            ("timeout_secs", v_num(head_timeout.as_secs_f64())),
                        ]),
                    );
                    continue;
                }
            };

        let started = std::time::Instant::now();
        let response = handle(&request_line, &app).await;
        if let Err(err) = writer.write_all(response.to_http().as_bytes()).await {
            logging::warn(
                Domain::Server,
                "write_failed",
                obj(&[("msg", v_str(&err.to_string()))]),
            );
        }
        let _ = writer.shutdown().await;

        logging::debug(
            Domain::Server,
            "request",
            obj(&[
                ("route", v_str(&request_line)),
                ("peer", v_str(&peer.to_string())),
                ("status", v_str(response.status)),
                ("elapsed_ms", v_num(started.elapsed().as_secs_f64() * 1000.0)),
            ]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::rates::{RateError, RateSource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Offline;

    #[async_trait]
    impl RateSource for Offline {
        async fn fetch(&self) -> Result<HashMap<String, f64>, RateError> {
            Err(RateError::Timeout)
        }
    }

    fn app() -> AppState {
        AppState::with_fetcher(
            Config::default(),
            RateFetcher::new(Box::new(Offline), Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn index_renders_html() {
        let resp = handle("GET / HTTP/1.1", &app()).await;
        assert_eq!(resp.status, "200 OK");
        assert!(resp.content_type.starts_with("text/html"));
        assert!(resp.body.contains("ZERO-GRAVITY // 2026"));
    }

    #[tokio::test]
    async fn toggle_redirects_with_alert_flipped() {
        let app = app();
        let resp = handle("GET /toggle?alert=0&country=Peru HTTP/1.1", &app).await;
        assert_eq!(resp.status, "303 See Other");
        let location = &resp.headers[0].1;
        assert!(location.starts_with("/?alert=1"));
        assert!(location.contains("country=Peru"));

        let back = handle("GET /toggle?alert=1 HTTP/1.1", &app).await;
        assert!(back.headers[0].1.starts_with("/?alert=0"));
    }

    #[tokio::test]
    async fn api_view_uses_fallback_rates_offline() {
        let resp = handle("GET /api/view?alert=1 HTTP/1.1", &app()).await;
        let view: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(view["confidence"], 15);
        assert_eq!(view["rates_origin"], "fallback");
        assert_eq!(view["risk_matrix"][0]["country"], "Hungary");
    }

    #[tokio::test]
    async fn evaporate_returns_all_steps() {
        let resp = handle("GET /api/evaporate?amount=2000 HTTP/1.1", &app()).await;
        let steps: Vec<serde_json::Value> = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(steps.len(), 21);
        assert_eq!(steps[0]["value"], 2000.0);
        assert_eq!(steps[20]["percent_remaining"], 0);
    }

    #[tokio::test]
    async fn export_is_a_csv_attachment() {
        let resp = handle("GET /export.csv HTTP/1.1", &app()).await;
        assert_eq!(resp.content_type, "text/csv");
        assert!(resp.headers[0].1.contains("zeros_history.csv"));
        assert_eq!(resp.body.lines().count(), 27);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let app = app();
        assert_eq!(handle("GET /nope HTTP/1.1", &app).await.status, "404 NOT FOUND");
        assert_eq!(handle("POST / HTTP/1.1", &app).await.status, "405 Method Not Allowed");
        assert_eq!(handle("", &app).await.status, "404 NOT FOUND");
    }

    async fn health_over_tcp(addr: std::net::SocketAddr) -> String {
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /api/health HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        conn.read_to_string(&mut raw).await.unwrap();
        raw
    }

    fn spawn_server(request_timeout_secs: u64) -> std::net::SocketAddr {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let addr = std_listener.local_addr().unwrap();
        let listener = TcpListener::from_std(std_listener).unwrap();
        let cfg = Config {
            request_timeout_secs,
            ..Config::default()
        };
        let app = AppState::with_fetcher(
            cfg,
            RateFetcher::new(Box::new(Offline), Duration::from_secs(60)),
        );
        tokio::spawn(serve_on(listener, app));
        addr
    }

    #[tokio::test]
    async fn idle_client_does_not_block_later_requests() {
        let addr = spawn_server(1);
        assert!(health_over_tcp(addr).await.starts_with("HTTP/1.1 200 OK"));

        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        let answered = tokio::time::timeout(Duration::from_secs(5), health_over_tcp(addr))
            .await
            .expect("server stalled behind a silent connection");
        assert!(answered.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn oversized_request_head_is_rejected() {
        let long = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_REQUEST_BYTES as usize));
        let err = read_request_head(long.as_bytes()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let ok = read_request_head(&b"GET /api/health HTTP/1.1\r\nHost: x\r\n\r\n"[..])
            .await
            .unwrap();
        assert_eq!(ok.as_deref(), Some("GET /api/health HTTP/1.1"));
        assert_eq!(read_request_head(&b""[..]).await.unwrap(), None);
    }

    #[test]
    fn http_framing() {
        let raw = Response::redirect("/?alert=1".to_string()).to_http();
        assert!(raw.starts_with("HTTP/1.1 303 See Other\r\n"));
        assert!(raw.contains("Location: /?alert=1\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }
}
