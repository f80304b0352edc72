//! Logging setup using tracing.
//!
//! Two tiers: warnings and errors only by default, everything down to debug when
//! the `--debug` flag is given.

use crate::backup::result_error::result::Result;
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;

pub fn max_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Builds a subscriber that writes plain text to `make_writer`.
pub fn subscriber<W>(debug: bool, make_writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_max_level(max_level(debug))
        .with_ansi(false)
        .with_writer(make_writer)
        .finish()
}

/// Installs the process-wide subscriber writing to stderr.
pub fn init(debug: bool) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(debug, std::io::stderr))?;
    Ok(())
}
