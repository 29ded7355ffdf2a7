use std::sync::Arc;

use anyhow::Result;
use bodyboard::config::Config;
use bodyboard::engine::{render, View};
use bodyboard::loader::{SystemClock, TableLoader};
use bodyboard::logging::{log, obj, v_str, Domain, Level};
use bodyboard::source::HttpSheetSource;
use serde_json::json;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let mut params = cfg.engine_params();
    if let Some(view) = std::env::args().nth(1).and_then(|a| View::parse(&a)) {
        params.view = view;
    }

    let loader = TableLoader::with_clock(
        HttpSheetSource::with_timeout(cfg.http_timeout_secs),
        Arc::new(SystemClock),
        cfg.cache_ttl_secs,
    );
    let sources = cfg.sources();

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("view", v_str(params.view.as_str())),
            ("body_sheet", v_str(&cfg.body_sheet_id)),
            ("training_configured", json!(sources.training.is_some())),
            ("cache_ttl_secs", json!(cfg.cache_ttl_secs)),
            ("refresh_secs", json!(cfg.refresh_secs)),
        ]),
    );

    loop {
        let loaded = loader.load_sources(&sources).await;
        let dashboard = render(&loaded, &params);
        println!("{}", serde_json::to_string(&dashboard)?);

        match cfg.refresh_secs {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => break,
        }
    }

    log(Level::Info, Domain::System, "shutdown", obj(&[]));
    Ok(())
}
