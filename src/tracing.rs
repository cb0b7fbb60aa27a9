//! Log output for binaries that embed the crate.
//!
//! Opening a channel emits one INFO record naming the transport, with
//! `server_address` and `max_message_length` attached. The subscriber built
//! here renders those fields either as flat JSON objects or as compact text.

use std::io;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    EnvFilter,
    Layer,
    Registry,
};

/// `RUST_LOG` when set, INFO otherwise so the connection records show up.
pub fn channel_env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

pub fn channel_log_layer<S, W>(
    structured_logging: bool,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if structured_logging {
        return Box::new(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .flatten_event(true)
                .with_writer(writer),
        );
    }

    Box::new(fmt::layer().compact().with_writer(writer))
}

/// A subscriber writing channel records to `writer`, filtered by `filter`.
pub fn build_subscriber<W>(
    structured_logging: bool,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    Registry::default().with(channel_log_layer(structured_logging, writer).with_filter(filter))
}

/// Installs a stdout subscriber as the global default. Fails if one is
/// already installed.
pub fn setup_tracing(structured_logging: bool) -> Result<()> {
    let subscriber = build_subscriber(structured_logging, channel_env_filter(), io::stdout);
    tracing::subscriber::set_global_default(subscriber)
        .context("installing the global tracing subscriber")?;
    Ok(())
}
