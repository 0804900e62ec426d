//! booru_dl main binary

use std::{io::Write as _, process::ExitCode, sync::Arc};

use anyhow::Context as _;
use booru_dl::{BooruClient, Danbooru, cl, cl::ExtensionFilter, log_sink, scrape};
use clap::Parser as _;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CL args
    let cl_args = cl::BooruDlArgs::parse();

    // Init loggers
    simple_logger::init_with_level(cl_args.verbosity).context("Failed to setup logger")?;
    let started = log_sink::timestamp();
    let log_path = cl_args.log_path(&started);
    let mut log = log_sink::open(&log_path)
        .with_context(|| format!("Failed to open log file {log_path:?}"))?;

    let config = cl_args.scrape_config(&started);
    writeln!(log, "args: {cl_args:?}")?;
    if config.extensions == ExtensionFilter::Any {
        writeln!(log, "extension list contains \"*\", downloading all extensions")?;
    }
    writeln!(log, "need_file_ext:{}", config.extensions)?;
    writeln!(log, "config: {config:?}")?;

    // Setup clients
    let http = Arc::new(BooruClient::new(
        cl_args.api_timeout(),
        cl_args.download_timeout(),
        cl_args.credentials.basic_auth(),
    )?);
    let source = Danbooru::new(&cl_args.site.base_url(), Arc::clone(&http))?;

    // Run
    let status = match scrape(&config, &source, http.as_ref(), &mut log).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            writeln!(log, "error. {:#}", anyhow::Error::new(err))?;
            code
        }
    };
    log.flush()?;
    Ok(status)
}
