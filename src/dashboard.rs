//! Dashboard assembly: every panel of the page as one serializable view, plus a
//! self-contained HTML rendering of it.

use rand::Rng;
use serde::Serialize;
use std::fmt::Write as _;

use crate::dataset::{self, CurrencyEvent};
use crate::evaporation::{Evaporation, EvaporationStep};
use crate::feed::rates::{RateOrigin, RateTable};
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};
use crate::metrics::{self, RiskCard, ShaveLevel};
use crate::presentation::{DisplayOptions, Palette, PresentationState};

pub const RISK_MATRIX_SIZE: usize = 5;
pub const GHOST_GRID_COLUMNS: usize = 4;
/// Fixed fourth radar axis.
pub const META_VOLATILITY: f64 = 0.5;
pub const EVAPORATION_DONE: &str = "EVAPORATION COMPLETE: ASSETS REDUCED TO DATA-DUST.";

const NEWS_FEED: [&str; 5] = [
    "BREAKING: Lunar Colony adopts New Hungarian Pengo for space trade.",
    "ALERT: AI Central Bank predicts hyperinflation in the Metaverse real estate.",
    "UPDATE: Zero-G Protocol activated by G7 finance ministers.",
    "MARKET: Ghost Rates reach all-time highs in the Shadow Economy.",
    "INFO: Digital Yen redenominated to 'Neo-Yen' with 12 zeros removed.",
];

const BREAD_INDEX: [(&str, f64); 4] = [
    ("Stable", 10.0),
    ("Inflated", 1.0),
    ("Hyperactive", 0.0001),
    ("Rebooted", 9.5),
];

/// Interactive inputs of one render. Travels in the request; nothing is kept
/// between renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardQuery {
    pub state: PresentationState,
    pub display: DisplayOptions,
    pub country: Option<String>,
    /// Vault deposit for the evaporation panel
    pub amount: f64,
    pub evaporate: bool,
    /// Shaver input
    pub credits: f64,
    pub level: ShaveLevel,
    pub stabilize: bool,
    /// Countdown pace for the browser replay. Set by the server, not the URL.
    pub evap_step_ms: u64,
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self {
            state: PresentationState::Normal,
            display: DisplayOptions::default(),
            country: None,
            amount: 1000.0,
            evaporate: false,
            credits: 1_000_000_000.0,
            level: ShaveLevel::default(),
            stabilize: false,
            evap_step_ms: 100,
        }
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

impl DashboardQuery {
    /// Parse a URL query string. Unknown keys and unparsable values keep their defaults.
    pub fn from_query(query: &str) -> Self {
        let mut q = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "alert" => {
                    if let Some(b) = parse_flag(&value) {
                        q.state = PresentationState::from_flag(b);
                    }
                }
                "neon" => q.display.neon_glow = parse_flag(&value).unwrap_or(q.display.neon_glow),
                "scanlines" => q.display.scanlines = parse_flag(&value).unwrap_or(q.display.scanlines),
                "country" if !value.is_empty() => q.country = Some(value.into_owned()),
                "amount" => q.amount = value.parse().ok().filter(|v: &f64| v.is_finite()).unwrap_or(q.amount),
                "credits" => q.credits = value.parse().ok().filter(|v: &f64| v.is_finite()).unwrap_or(q.credits),
                "level" => {
                    if let Some(level) = value.parse::<u32>().ok().and_then(|e| ShaveLevel::try_from(e).ok()) {
                        q.level = level;
                    }
                }
                "evaporate" => q.evaporate = parse_flag(&value).unwrap_or(false),
                "stabilize" => q.stabilize = parse_flag(&value).unwrap_or(false),
                _ => {}
            }
        }
        q
    }

    /// Query string carrying the persistent inputs. One-shot actions are dropped.
    pub fn to_query(&self) -> String {
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        ser.append_pair("alert", flag(self.state.is_alert()));
        ser.append_pair("neon", flag(self.display.neon_glow));
        ser.append_pair("scanlines", flag(self.display.scanlines));
        if let Some(country) = &self.country {
            ser.append_pair("country", country);
        }
        ser.append_pair("amount", &self.amount.to_string());
        ser.append_pair("credits", &self.credits.to_string());
        ser.append_pair("level", &self.level.exponent().to_string());
        ser.finish()
    }

    /// The same inputs with alert mode flipped.
    pub fn toggled(&self) -> Self {
        Self {
            state: self.state.toggle(),
            evaporate: false,
            stabilize: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPanel {
    pub country: String,
    pub axes: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub country: String,
    pub year: i32,
    pub zeros: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapCell {
    pub iso: String,
    pub country: String,
    pub zeros: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GhostCell {
    pub country: String,
    pub year: i32,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaporationPanel {
    pub amount: f64,
    pub step_ms: u64,
    pub steps: Vec<EvaporationStep>,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaverPanel {
    pub credits: f64,
    pub exponent: u32,
    pub result: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub query: String,
    pub state: PresentationState,
    pub headline: String,
    pub status: &'static str,
    pub warning: Option<&'static str>,
    pub confidence: u8,
    pub palette: Palette,
    pub glow: String,
    pub scanline_opacity: &'static str,
    pub shaking: bool,
    pub ticker: String,
    pub quote: &'static str,
    pub analyst_version: &'static str,
    pub vault_amount: f64,
    pub evaporation: Option<EvaporationPanel>,
    pub risk_matrix: Vec<RiskCard>,
    pub radar: Option<RadarPanel>,
    pub chronos: Vec<TimelinePoint>,
    pub bread_index: Vec<(&'static str, f64)>,
    pub map_scale: &'static str,
    pub scanner: Vec<MapCell>,
    pub rates_origin: RateOrigin,
    pub ghosts: Vec<GhostCell>,
    pub shaver: ShaverPanel,
    pub countries: Vec<String>,
    pub shave_levels: Vec<u32>,
    pub footer: &'static str,
}

impl DashboardView {
    pub fn build<R: Rng + ?Sized>(
        events: &[CurrencyEvent],
        rates: &RateTable,
        query: &DashboardQuery,
        rng: &mut R,
    ) -> Self {
        let _scope = ProfileScope::new("dashboard_build");
        let state = query.state;
        let palette = state.palette();

        let selected = query
            .country
            .as_deref()
            .and_then(|name| dataset::find_country(events, name))
            .or_else(|| events.first());
        let radar = selected.map(|e| RadarPanel {
            country: e.country.clone(),
            axes: vec![
                ("Risk".to_string(), e.risk),
                ("Stability".to_string(), e.stability),
                ("Faith".to_string(), e.faith),
                ("Meta-Volatility".to_string(), META_VOLATILITY),
            ],
        });

        let evaporation = query.evaporate.then(|| EvaporationPanel {
            amount: query.amount,
            step_ms: query.evap_step_ms,
            steps: Evaporation::new(query.amount).collect(),
            message: EVAPORATION_DONE,
        });

        let ghosts = events
            .iter()
            .map(|e| {
                let value = metrics::ghost_value(e, rates);
                GhostCell {
                    country: e.country.clone(),
                    year: e.year,
                    value,
                    label: sci_label(value),
                }
            })
            .collect();

        let view = Self {
            query: query.to_query(),
            state,
            headline: format!("ZERO-GRAVITY // {}", state.headline()),
            status: state.status(),
            warning: state.warning(),
            confidence: state.confidence(),
            palette,
            glow: query.display.glow(state),
            scanline_opacity: query.display.scanline_opacity(),
            shaking: state.shaking(),
            ticker: NEWS_FEED.join(" | "),
            quote: state.pick_quote(rng),
            analyst_version: state.analyst_version(),
            vault_amount: query.amount,
            evaporation,
            risk_matrix: metrics::top_risks(events, RISK_MATRIX_SIZE),
            radar,
            chronos: events
                .iter()
                .map(|e| TimelinePoint {
                    country: e.country.clone(),
                    year: e.year,
                    zeros: e.zeros_removed,
                })
                .collect(),
            bread_index: BREAD_INDEX.to_vec(),
            map_scale: palette.map_scale,
            scanner: events
                .iter()
                .map(|e| MapCell {
                    iso: e.iso_code.clone(),
                    country: e.country.clone(),
                    zeros: e.zeros_removed,
                })
                .collect(),
            rates_origin: rates.origin(),
            ghosts,
            shaver: ShaverPanel {
                credits: query.credits,
                exponent: query.level.exponent(),
                result: query
                    .stabilize
                    .then(|| metrics::shave(query.credits, query.level)),
            },
            countries: dataset::countries(events).into_iter().map(String::from).collect(),
            shave_levels: ShaveLevel::ALL.iter().map(|l| l.exponent()).collect(),
            footer: state.footer(),
        };

        logging::debug(
            Domain::View,
            "dashboard_built",
            obj(&[
                ("mode", v_str(state.status())),
                ("confidence", v_num(f64::from(view.confidence))),
                ("rates_origin", serde_json::json!(view.rates_origin)),
            ]),
        );
        view
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// =============================================================================
// HTML rendering
// =============================================================================

fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `1.0e+12` style: one decimal, signed exponent of at least two digits.
fn sci_label(value: f64) -> String {
    let raw = format!("{:.1e}", value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

/// Thousands separators, like `{:,.N}` elsewhere.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && value.abs() >= 0.5 * 10f64.powi(-(decimals as i32)) {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn gauge_svg(confidence: u8, color: &str) -> String {
    // Semicircle from 180deg (0) to 0deg (100)
    let angle = std::f64::consts::PI * (1.0 - f64::from(confidence) / 100.0);
    let (cx, cy, r) = (100.0, 100.0, 80.0);
    let x = cx + r * angle.cos();
    let y = cy - r * angle.sin();
    format!(
        r##"<svg viewBox="0 0 200 120" class="gauge"><path d="M20,100 A80,80 0 0,1 180,100" stroke="#333" stroke-width="14" fill="none"/><path d="M20,100 A80,80 0 0,1 {x:.2},{y:.2}" stroke="{color}" stroke-width="14" fill="none"/><text x="100" y="95" text-anchor="middle" class="gauge-num">{confidence}</text><text x="100" y="115" text-anchor="middle" class="gauge-label">MARKET_CONFIDENCE</text></svg>"##,
    )
}

fn radar_svg(radar: &RadarPanel, color: &str) -> String {
    let n = radar.axes.len().max(1) as f64;
    let (cx, cy, r) = (120.0, 120.0, 90.0);
    let mut points = Vec::new();
    let mut labels = String::new();
    for (i, (name, value)) in radar.axes.iter().enumerate() {
        let theta = -std::f64::consts::FRAC_PI_2 + 2.0 * std::f64::consts::PI * i as f64 / n;
        points.push(format!(
            "{:.2},{:.2}",
            cx + r * value * theta.cos(),
            cy + r * value * theta.sin()
        ));
        let _ = write!(
            labels,
            r##"<line x1="{cx}" y1="{cy}" x2="{:.2}" y2="{:.2}" stroke="#444"/><text x="{:.2}" y="{:.2}" text-anchor="middle" class="axis">{}</text>"##,
            cx + r * theta.cos(),
            cy + r * theta.sin(),
            cx + (r + 18.0) * theta.cos(),
            cy + (r + 18.0) * theta.sin() + 4.0,
            esc(name)
        );
    }
    format!(
        r#"<svg viewBox="0 0 240 240" class="radar">{labels}<polygon points="{}" fill="{color}" fill-opacity="0.35" stroke="{color}"/></svg>"#,
        points.join(" ")
    )
}

fn chronos_svg(points: &[TimelinePoint], color: &str) -> String {
    if points.is_empty() {
        return r#"<svg viewBox="0 0 400 200" class="chronos"></svg>"#.to_string();
    }
    let (min_year, max_year) = points
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), p| (lo.min(p.year), hi.max(p.year)));
    let span = f64::from((max_year - min_year).max(1));
    let max_zeros = points.iter().map(|p| p.zeros).max().unwrap_or(1).max(1) as f64;
    let mut dots = String::new();
    for p in points {
        let x = 20.0 + 360.0 * f64::from(p.year - min_year) / span;
        let y = 180.0 - 160.0 * f64::from(p.zeros) / max_zeros;
        let radius = 3.0 + 17.0 * f64::from(p.zeros) / max_zeros;
        let _ = write!(
            dots,
            r#"<circle cx="{x:.1}" cy="{y:.1}" r="{radius:.1}" fill="{color}" fill-opacity="0.5"><title>{} ({}) {} zeros</title></circle>"#,
            esc(&p.country),
            p.year,
            p.zeros
        );
    }
    format!(r#"<svg viewBox="0 0 400 200" class="chronos">{dots}</svg>"#)
}

fn bread_svg(points: &[(&str, f64)], color: &str) -> String {
    let max = points.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max).max(f64::EPSILON);
    let step = 360.0 / (points.len().saturating_sub(1).max(1)) as f64;
    let mut line = vec!["20,180".to_string()];
    let mut labels = String::new();
    for (i, (phase, kg)) in points.iter().enumerate() {
        let x = 20.0 + step * i as f64;
        let y = 180.0 - 160.0 * kg / max;
        line.push(format!("{x:.1},{y:.1}"));
        let _ = write!(
            labels,
            r#"<text x="{x:.1}" y="196" text-anchor="middle" class="axis">{}</text>"#,
            esc(phase)
        );
    }
    line.push("380,180".to_string());
    format!(
        r#"<svg viewBox="0 0 400 200" class="bread"><polygon points="{}" fill="{color}" fill-opacity="0.4" stroke="{color}"/>{labels}</svg>"#,
        line.join(" ")
    )
}

/// Colour for a scanner tile, interpolated on the active scale.
fn scale_color(scale: &str, t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let (from, to) = match scale {
        "Reds" => ((255.0, 245.0, 240.0), (103.0, 0.0, 13.0)),
        _ => ((68.0, 1.0, 84.0), (253.0, 231.0, 37.0)),
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        lerp(from.0, to.0),
        lerp(from.1, to.1),
        lerp(from.2, to.2)
    )
}

pub fn render_html(view: &DashboardView) -> String {
    let _scope = ProfileScope::new("render_html");
    let p = &view.palette;
    let primary = p.primary;
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Zero-Gravity: 2026 Core</title>
  <style>
    body {{ margin: 0; background: radial-gradient(circle at 50% 50%, {bg}, #000); color: #e0e0e0; font-family: 'Rajdhani', sans-serif; animation: {shake}; }}
    body::before {{ content: " "; position: fixed; inset: 0; pointer-events: none; opacity: {scan};
      background: linear-gradient(rgba(18,16,16,0) 50%, rgba(0,0,0,0.25) 50%); background-size: 100% 2px; }}
    @keyframes shake {{ 0% {{ transform: translate(1px,1px); }} 50% {{ transform: translate(-1px,2px); }} 100% {{ transform: translate(1px,-2px); }} }}
    @keyframes scroll {{ 0% {{ transform: translateX(100%); }} 100% {{ transform: translateX(-100%); }} }}
    aside {{ position: fixed; left: 0; top: 0; bottom: 0; width: 240px; padding: 1rem; background: rgba(0,0,0,0.6); overflow-y: auto; }}
    main {{ margin-left: 272px; padding: 1rem 2rem; }}
    .neon {{ color: {primary}; text-shadow: {glow}; font-family: 'Orbitron', sans-serif; }}
    .glitch {{ font-size: 2.4rem; font-weight: bold; text-transform: uppercase; text-shadow: {glow}; }}
    .card {{ background: rgba(255,255,255,0.05); border-radius: 15px; padding: 1rem; border: 1px solid {primary}44; box-shadow: {glow}; }}
    .row {{ display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; margin: 1rem 0; }}
    .matrix {{ display: grid; grid-template-columns: repeat(5, 1fr); gap: 0.8rem; }}
    .ghosts {{ display: grid; grid-template-columns: repeat({cols}, 1fr); gap: 0.8rem; }}
    .tiles {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(64px, 1fr)); gap: 4px; }}
    .tile {{ padding: 0.4rem; text-align: center; font-family: monospace; color: #000; border-radius: 4px; }}
    .ticker-wrap {{ overflow: hidden; border-bottom: 2px solid {primary}; padding: 8px 0; }}
    .ticker {{ white-space: nowrap; display: inline-block; animation: scroll 30s linear infinite; font-family: monospace; color: {primary}; font-weight: bold; }}
    .warning {{ background: #5a0000; color: #fff; padding: 0.5rem; border-radius: 6px; }}
    .muted {{ color: #888; font-size: 0.75em; margin: 0; }}
    .axis, .gauge-label {{ fill: #aaa; font-size: 10px; }}
    .gauge-num {{ fill: {primary}; font-size: 28px; }}
    svg {{ width: 100%; }}
    a.button, button {{ display: block; width: 100%; margin: 0.4rem 0; padding: 0.5rem; background: {primary}; color: #000; border: 0; text-align: center; text-decoration: none; font-weight: bold; cursor: pointer; }}
  </style>
</head>
<body>
"#,
        bg = p.background,
        shake = if view.shaking { "shake 0.5s infinite" } else { "none" },
        scan = view.scanline_opacity,
        glow = view.glow,
        cols = GHOST_GRID_COLUMNS,
    );

    // Sidebar: toggles, meltdown, export
    let _ = write!(
        html,
        r#"<aside>
  <h2 class="neon">TERMINAL_CMD</h2>
  <form method="get" action="/">
    {hidden}
    <input type="hidden" name="neon" value="0"><label><input type="checkbox" name="neon" value="1" {neon}> Max Neon Glow</label><br>
    <input type="hidden" name="scanlines" value="0"><label><input type="checkbox" name="scanlines" value="1" {scan}> Overlay Scanlines</label>
    <button type="submit">APPLY</button>
  </form>
  <h2 class="neon">PROTOCOLS</h2>
  <a class="button" href="/toggle?{query}">EMERGENCY_MELTDOWN</a>
"#,
        hidden = hidden_inputs(view, &["neon", "scanlines"]),
        neon = if view.glow != "none" { "checked" } else { "" },
        scan = if view.scanline_opacity != "0" { "checked" } else { "" },
        query = esc(&view.query),
    );
    if let Some(w) = view.warning {
        let _ = write!(html, r#"  <p class="warning">{}</p>"#, esc(w));
    }
    let _ = write!(
        html,
        r#"
  <h2 class="neon">DATA_LINK</h2>
  <a class="button" href="/export.csv">Sync Database</a>
  <p>System Status: {status}</p>
  <p class="muted">Rates: {origin}</p>
</aside>
<main>
<div class="ticker-wrap"><div class="ticker">{ticker}</div></div>
<div class="row"><div class="glitch">{headline}</div><div>{gauge}</div></div>
"#,
        status = view.status,
        origin = match view.rates_origin {
            RateOrigin::Live => "live",
            RateOrigin::Fallback => "fallback",
        },
        ticker = esc(&view.ticker),
        headline = esc(&view.headline),
        gauge = gauge_svg(view.confidence, primary),
    );

    // Oracle
    let _ = write!(
        html,
        r#"<h3>THE ORACLE'S VISION</h3>
<div class="card" style="border-left: 5px solid {primary};"><p><em>"{}"</em></p><p style="text-align:right;color:{primary};">CORE_ANALYSIS_v{}</p></div>
"#,
        esc(view.quote),
        view.analyst_version
    );

    // Evaporator
    let _ = write!(
        html,
        r#"<h3>THE_EVAPORATOR: WEALTH_DISSOLUTION_SIM</h3>
<div class="row"><form method="get" action="/" class="card">{hidden}<label>Vault Deposit ($): <input name="amount" type="number" step="100" value="{amount}"></label><input type="hidden" name="evaporate" value="1"><button type="submit">ACTIVATE_EVAPORATION</button></form><div class="card" id="evap">"#,
        hidden = hidden_inputs(view, &["amount"]),
        amount = view.vault_amount,
    );
    match &view.evaporation {
        Some(evap) => {
            let last = evap.steps.last().map(|s| s.value).unwrap_or(0.0);
            let _ = write!(
                html,
                r#"<p class="muted" id="evap-status">DISSOLVING... Confidence: 0%</p><h2 style="color:{primary};" id="evap-value">Value: ${}</h2><p class="warning">{}</p>"#,
                group_thousands(last, 2),
                esc(evap.message)
            );
        }
        None => html.push_str("VAULT_IDLE // AWAITING AUTHORIZATION"),
    }
    html.push_str("</div></div>\n");

    // Risk matrix
    html.push_str("<h3>PREDICTIVE_RISK_MATRIX: THE_NEXT_ZERO</h3>\n<div class=\"matrix\">");
    for card in &view.risk_matrix {
        let top = if card.highlighted { primary } else { "#00d4ff" };
        let _ = write!(
            html,
            r#"<div class="card" style="border-top: 4px solid {top};"><p class="muted">{}</p><h2>{:.1}%</h2><p class="muted">PROBABILITY_SYNC</p></div>"#,
            esc(&card.country),
            card.probability
        );
    }
    html.push_str("</div>\n");

    // Radar + chronos
    html.push_str("<div class=\"row\"><div><h3>TACTICAL_CURRENCY_RADAR</h3><form method=\"get\" action=\"/\">");
    html.push_str(&hidden_inputs(view, &["country"]));
    html.push_str("<select name=\"country\" onchange=\"this.form.submit()\">");
    let selected = view.radar.as_ref().map(|r| r.country.as_str()).unwrap_or("");
    for c in &view.countries {
        let _ = write!(
            html,
            r#"<option{}>{}</option>"#,
            if c == selected { " selected" } else { "" },
            esc(c)
        );
    }
    html.push_str("</select></form>");
    if let Some(radar) = &view.radar {
        html.push_str(&radar_svg(radar, primary));
    }
    let _ = write!(
        html,
        "</div><div><h3>HISTORICAL_CHRONOS</h3>{}</div></div>\n",
        chronos_svg(&view.chronos, primary)
    );

    // Bread index + scanner
    let max_zeros = view.scanner.iter().map(|c| c.zeros).max().unwrap_or(1).max(1);
    let _ = write!(
        html,
        "<div class=\"row\"><div><h3>BREAD_INDEX: THE EROSION</h3>{}</div><div><h3>GLOBAL_SCANNER</h3><div class=\"tiles\">",
        bread_svg(&view.bread_index, primary)
    );
    for cell in &view.scanner {
        let _ = write!(
            html,
            r#"<div class="tile" style="background:{}" title="{}">{}<br>{}</div>"#,
            scale_color(view.map_scale, f64::from(cell.zeros) / f64::from(max_zeros)),
            esc(&cell.country),
            esc(&cell.iso),
            cell.zeros
        );
    }
    html.push_str("</div></div></div>\n");

    // Phantom values
    html.push_str("<h3>PHANTOM_VALUES (Old Units / 1 USD)</h3>\n<div class=\"ghosts\">");
    for g in &view.ghosts {
        let _ = write!(
            html,
            r#"<div class="card"><p class="muted">{} ({})</p><h3 style="color:{primary};">{}</h3></div>"#,
            esc(&g.country),
            g.year,
            esc(&g.label)
        );
    }
    html.push_str("</div>\n");

    // Shaver
    let _ = write!(
        html,
        r#"<h3>ZERO_SHAVER_HYPERMOD</h3>
<div class="row"><form method="get" action="/" class="card">{hidden}<label>INPUT_CREDITS: <input name="credits" type="number" step="1000000" value="{credits}"></label><br><label>LEVEL_OF_REDACTION: <select name="level">"#,
        hidden = hidden_inputs(view, &["credits", "level"]),
        credits = view.shaver.credits,
    );
    for exp in &view.shave_levels {
        let _ = write!(
            html,
            r#"<option value="{exp}"{}>{exp}</option>"#,
            if *exp == view.shaver.exponent { " selected" } else { "" }
        );
    }
    html.push_str(r#"</select></label><input type="hidden" name="stabilize" value="1"><button type="submit">EXECUTE_STABILIZATION</button></form><div class="card">"#);
    match view.shaver.result {
        Some(result) => {
            let _ = write!(
                html,
                r#"<h2 style="color:{primary};">STABILIZATION COMPLETE</h2><p>{} &rarr; <b style="color:#00d4ff;">{}</b></p>"#,
                group_thousands(view.shaver.credits, 0),
                group_thousands(result, 2)
            );
        }
        None => html.push_str("<p>AWAITING INPUT COMMAND...</p>"),
    }
    html.push_str("</div></div>\n");

    let _ = write!(
        html,
        r#"<hr><p style="text-align:center;opacity:0.5;font-size:0.8em;">ANTIGRAVITY SYSTEMS // 2026 // {}</p>
</main>
<script id="view" type="application/json">{}</script>
"#,
        view.footer,
        view.to_json().replace("</", "<\\/")
    );

    if view.evaporation.is_some() {
        html.push_str(EVAPORATION_SCRIPT);
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Replays the embedded countdown at the configured pace.
const EVAPORATION_SCRIPT: &str = r#"<script>
(function () {
  var view = JSON.parse(document.getElementById('view').textContent);
  var steps = view.evaporation.steps, pace = view.evaporation.step_ms, i = 0;
  var status = document.getElementById('evap-status'), value = document.getElementById('evap-value');
  var timer = setInterval(function () {
    if (i >= steps.length) { clearInterval(timer); return; }
    status.textContent = 'DISSOLVING... Confidence: ' + steps[i].percent_remaining + '%';
    value.textContent = 'Value: $' + steps[i].value.toLocaleString(undefined, {minimumFractionDigits: 2, maximumFractionDigits: 2});
    i++;
  }, pace);
})();
</script>
"#;

/// Hidden form fields carrying every persistent input except `skip`.
fn hidden_inputs(view: &DashboardView, skip: &[&str]) -> String {
    let mut out = String::new();
    for (key, value) in url::form_urlencoded::parse(view.query.as_bytes()) {
        if skip.contains(&&*key) {
            continue;
        }
        let _ = write!(
            out,
            r#"<input type="hidden" name="{}" value="{}">"#,
            esc(&key),
            esc(&value)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::historical_events;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(query: &DashboardQuery) -> DashboardView {
        let mut rng = StdRng::seed_from_u64(1);
        DashboardView::build(&historical_events(), &RateTable::fallback(), query, &mut rng)
    }

    #[test]
    fn query_parsing_keeps_defaults_on_garbage() {
        let q = DashboardQuery::from_query("alert=1&amount=abc&level=7&country=Peru&neon=0");
        assert!(q.state.is_alert());
        assert_eq!(q.amount, 1000.0);
        assert_eq!(q.level, ShaveLevel::Thousand);
        assert_eq!(q.country.as_deref(), Some("Peru"));
        assert!(!q.display.neon_glow);
        assert!(q.display.scanlines);
    }

    #[test]
    fn query_round_trips_persistent_inputs() {
        let q = DashboardQuery::from_query("alert=1&country=South+Korea&credits=5000&level=3&stabilize=1");
        let back = DashboardQuery::from_query(&q.to_query());
        assert_eq!(back.state, q.state);
        assert_eq!(back.country, q.country);
        assert_eq!(back.credits, 5000.0);
        assert_eq!(back.level, ShaveLevel::Thousand);
        assert!(!back.stabilize);
    }

    #[test]
    fn toggled_query_flips_only_alert() {
        let q = DashboardQuery::from_query("country=Iran&evaporate=1");
        let t = q.toggled();
        assert!(t.state.is_alert());
        assert_eq!(t.country, q.country);
        assert!(!t.evaporate);
        assert_eq!(t.toggled().state, q.state);
    }

    #[test]
    fn default_view_has_every_panel() {
        let view = build(&DashboardQuery::default());
        assert_eq!(view.confidence, 85);
        assert_eq!(view.headline, "ZERO-GRAVITY // 2026");
        assert_eq!(view.risk_matrix.len(), RISK_MATRIX_SIZE);
        assert_eq!(view.radar.as_ref().unwrap().country, "Hungary");
        assert_eq!(view.radar.as_ref().unwrap().axes[3], ("Meta-Volatility".to_string(), 0.5));
        assert_eq!(view.ghosts.len(), 26);
        assert_eq!(view.chronos.len(), 26);
        assert_eq!(view.map_scale, "Viridis");
        assert_eq!(view.rates_origin, RateOrigin::Fallback);
        assert!(view.evaporation.is_none());
        assert!(view.shaver.result.is_none());
        assert!(view.ticker.contains(" | "));
    }

    #[test]
    fn alert_view_switches_theme() {
        let q = DashboardQuery::from_query("alert=1");
        let view = build(&q);
        assert_eq!(view.confidence, 15);
        assert_eq!(view.map_scale, "Reds");
        assert_eq!(view.footer, "LEVEL_RED");
        assert!(view.warning.is_some());
        assert!(PresentationState::Alert.quotes().contains(&view.quote));
    }

    #[test]
    fn actions_fill_their_panels() {
        let q = DashboardQuery::from_query("evaporate=1&amount=500&stabilize=1&credits=1000000000&level=9");
        let view = build(&q);
        let evap = view.evaporation.unwrap();
        assert_eq!(evap.steps.len(), 21);
        assert_eq!(evap.steps[0].value, 500.0);
        assert_eq!(view.shaver.result, Some(1.0));
    }

    #[test]
    fn ghost_labels_use_scientific_notation() {
        let view = build(&DashboardQuery::default());
        let zim = view.ghosts.iter().find(|g| g.country == "Zimbabwe").unwrap();
        assert_eq!(zim.value, 1e12);
        assert_eq!(zim.label, "1.0e+12");
        assert_eq!(sci_label(42000.0), "4.2e+04");
        assert_eq!(sci_label(0.0012), "1.2e-03");
        assert_eq!(sci_label(4.2e29), "4.2e+29");
    }

    #[test]
    fn unknown_country_falls_back_to_first() {
        let view = build(&DashboardQuery::from_query("country=Atlantis"));
        assert_eq!(view.radar.unwrap().country, "Hungary");
    }

    #[test]
    fn html_contains_panels_and_escapes_text() {
        let html = render_html(&build(&DashboardQuery::from_query("alert=1&stabilize=1")));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("ZERO-GRAVITY // RED_ALERT"));
        assert!(html.contains("PREDICTIVE_RISK_MATRIX"));
        assert!(html.contains("93.0%"));
        assert!(html.contains("STABILIZATION COMPLETE"));
        assert!(html.contains("/toggle?alert=1"));
        assert!(html.contains("&#39;Neo-Yen&#39;"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(1_000_000_000.0, 0), "1,000,000,000");
        assert_eq!(group_thousands(1234.5, 2), "1,234.50");
        assert_eq!(group_thousands(999.0, 2), "999.00");
        assert_eq!(group_thousands(-1234.0, 0), "-1,234");
    }

    #[test]
    fn scale_colors_differ_by_mode() {
        assert_ne!(scale_color("Reds", 1.0), scale_color("Viridis", 1.0));
        assert_eq!(scale_color("Viridis", 0.0), "#440154");
    }
}
