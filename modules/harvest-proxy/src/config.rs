use std::path::PathBuf;
use std::time::Duration;

/// Port range the wrapper scans for a free local port before spawning the
/// proxy process. Defaults match the range historically reserved for
/// warcprox-style recording proxies.
#[derive(Debug, Clone)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 27500,
            end: 27600,
        }
    }
}

/// Everything needed to launch one scoped recording proxy instance.
///
/// The proxy binary itself (`warcprox` or a compatible recorder) is an
/// external collaborator — this crate does not vendor or reimplement it, only
/// the lifecycle around starting, environment-wiring, and stopping it.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Path or name of the recording proxy executable. Defaults to
    /// `PROXY_COMMAND` env var, falling back to `"warcprox"` on `$PATH`.
    pub command: PathBuf,
    pub port_range: PortRange,
    /// Directory the proxy writes WARCs into.
    pub warc_dir: PathBuf,
    /// Filename prefix for WARCs written in this scope (`safe_id`).
    pub prefix: String,
    pub gzip: bool,
    /// `None` for one-shot harvests; streams set this to roll WARCs over.
    pub rollover_secs: Option<u64>,
    /// Streams interrupt in-flight requests on shutdown; one-shots drain.
    pub interrupt_on_shutdown: bool,
    /// How long to wait after a graceful terminate before sending a kill.
    pub shutdown_grace: Duration,
}

impl ProxyConfig {
    pub fn new(warc_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let command = std::env::var_os("PROXY_COMMAND")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("warcprox"));
        Self {
            command,
            port_range: PortRange::default(),
            warc_dir: warc_dir.into(),
            prefix: prefix.into(),
            gzip: true,
            rollover_secs: None,
            interrupt_on_shutdown: false,
            shutdown_grace: Duration::from_secs(10),
        }
    }

    pub fn with_rollover_secs(mut self, secs: Option<u64>) -> Self {
        self.rollover_secs = secs;
        self
    }

    pub fn with_interrupt_on_shutdown(mut self, interrupt: bool) -> Self {
        self.interrupt_on_shutdown = interrupt;
        self
    }
}
