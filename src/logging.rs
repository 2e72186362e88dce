use anyhow::Context as _;

/// Install the stderr tracing subscriber. `RUST_LOG` wins when set;
/// otherwise `warn`, or `debug` for this crate when `verbose`.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "warn,litscrape=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
