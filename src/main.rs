use anyhow::{anyhow, bail, Context, Result};
use futures_util::StreamExt;
use std::path::Path;
use std::str::FromStr;

use zerogravity::config::Config;
use zerogravity::dashboard::{group_thousands, render_html, DashboardQuery, DashboardView};
use zerogravity::dataset::{self, historical_events};
use zerogravity::evaporation;
use zerogravity::export::write_csv;
use zerogravity::feed::rates::RateFetcher;
use zerogravity::logging::{self, obj, v_num, v_str, Domain};
use zerogravity::metrics::{self, ShaveLevel};
use zerogravity::server::{self, AppState};

const USAGE: &str = "usage: zerogravity [serve | render [--out PATH] [--query QS] | export [--out PATH] | rank [--top N] | ghosts | rates | shave VALUE EXPONENT | evaporate AMOUNT]";

/// Value following `--name`, if present.
fn opt<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn positional<T>(args: &[String], idx: usize, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    args.get(idx)
        .ok_or_else(|| anyhow!("missing {}\n{}", what, USAGE))?
        .replace(',', "")
        .parse()
        .with_context(|| format!("{} must be a number", what))
}

fn shave_level(args: &[String]) -> Result<ShaveLevel> {
    let exponent: u32 = positional(args, 2, "EXPONENT")?;
    Ok(ShaveLevel::try_from(exponent)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");

    let issues = dataset::validate(&historical_events());
    for issue in &issues {
        logging::warn(
            Domain::System,
            "dataset_issue",
            obj(&[("country", v_str(&issue.country)), ("msg", v_str(&issue.message))]),
        );
    }

    match command {
        "serve" => {
            logging::info(
                Domain::System,
                "startup",
                obj(&[
                    ("rates_url", v_str(&cfg.rates_url)),
                    ("rates_ttl_secs", v_num(cfg.rates_ttl_secs as f64)),
                ]),
            );
            server::serve(AppState::new(cfg)).await
        }
        "render" => {
            let out = opt(&args, "--out").unwrap_or(cfg.dashboard_path.as_str()).to_string();
            let mut query = DashboardQuery::from_query(opt(&args, "--query").unwrap_or(""));
            query.evap_step_ms = cfg.evap_step_ms;
            let rates = RateFetcher::from_config(&cfg).rates().await;
            let view = DashboardView::build(&historical_events(), &rates, &query, &mut rand::thread_rng());
            let path = Path::new(&out);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, render_html(&view)).with_context(|| format!("writing {}", out))?;
            println!("Dashboard written to {}", out);
            Ok(())
        }
        "export" => {
            let out = opt(&args, "--out").unwrap_or(cfg.export_path.as_str()).to_string();
            let manifest = write_csv(Path::new(&out), &historical_events())?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
            Ok(())
        }
        "rank" => {
            let top: usize = opt(&args, "--top").and_then(|v| v.parse().ok()).unwrap_or(5);
            let events = historical_events();
            println!("{:<4} {:<14} {:>6} {:>6} {:>8}", "#", "Country", "Year", "Zeros", "P(next)");
            for (i, e) in metrics::rank_by_risk(&events).into_iter().take(top).enumerate() {
                println!(
                    "{:<4} {:<14} {:>6} {:>6} {:>7.1}%",
                    i + 1,
                    e.country,
                    e.year,
                    e.zeros_removed,
                    metrics::next_zero_probability(e)
                );
            }
            Ok(())
        }
        "ghosts" => {
            let rates = RateFetcher::from_config(&cfg).rates().await;
            println!("Old units per 1 USD ({:?} rates)", rates.origin());
            for e in historical_events() {
                println!(
                    "{:<14} ({}) {:>10.1e}",
                    e.country,
                    e.year,
                    metrics::ghost_value(&e, &rates)
                );
            }
            Ok(())
        }
        "rates" => {
            let rates = RateFetcher::from_config(&cfg).rates().await;
            println!("origin: {:?}, {} currencies", rates.origin(), rates.len());
            for (code, rate) in rates.iter() {
                println!("{:<4} {}", code, rate);
            }
            Ok(())
        }
        "shave" => {
            let value: f64 = positional(&args, 1, "VALUE")?;
            let level = shave_level(&args)?;
            let result = metrics::shave(value, level);
            println!("{} -> {}", group_thousands(value, 0), group_thousands(result, 2));
            Ok(())
        }
        "evaporate" => {
            let amount: f64 = positional(&args, 1, "AMOUNT")?;
            let mut steps = Box::pin(evaporation::paced(amount, cfg.evap_step()));
            while let Some(step) = steps.next().await {
                println!(
                    "DISSOLVING... Confidence: {:>3}%  Value: ${}",
                    step.percent_remaining,
                    group_thousands(step.value, 2)
                );
            }
            println!("{}", zerogravity::dashboard::EVAPORATION_DONE);
            Ok(())
        }
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command `{}`\n{}", other, USAGE),
    }
}
