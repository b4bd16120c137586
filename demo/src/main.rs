use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wgi_core::{invoke_async, CgiAdapter, Event, EventAdapter, Mode};
use wgi_demo::config::{Config, LogFormat};

/// Logs go to stderr: stdout carries the response in both modes.
fn install_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    install_tracing(config.log_format);

    let mode = config.mode();
    let delay = config.delay();
    tracing::debug!(%mode, delay_ms = config.delay_ms, "starting");

    match mode {
        Mode::Cgi => {
            let mut cgi = CgiAdapter::from_process();
            invoke_async(&mut cgi, (), |req| wgi_demo::hello(req, delay)).await?;
        }
        Mode::Event => {
            let raw = config.read_event().context("failed to read event")?;
            let event = Event::from_json(&raw)?;
            let envelope =
                invoke_async(&mut EventAdapter::new(), event, |req| wgi_demo::hello(req, delay))
                    .await?;
            println!("{}", envelope.to_json()?);
        }
    }

    Ok(())
}
