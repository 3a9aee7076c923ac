mod config;
mod fetcher;
mod main_lib;

use std::process::ExitCode;
use std::sync::Arc;

use config::Config;
use main_lib::{init_tracing, Runner};
use stakeledger_core::shutdown::stop_channel;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);
    let runner = Runner::build(config)?;

    let (stop, _signal) = stop_channel();
    let stop = Arc::new(stop);
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight filings");
                stop.trigger();
            }
        });
    }

    let report = runner.run(stop).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.summary.is_fully_successful() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Run ended with {:?}", report.summary.termination);
        Ok(ExitCode::FAILURE)
    }
}
