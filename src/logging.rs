use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.  reqwest and hyper are chatty at
/// debug level and we rarely care.
pub const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// Install the global fmt subscriber, writing to stderr so stdout stays clean
/// for the CLI's output.  Calling this more than once is harmless; later calls
/// keep the first subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
