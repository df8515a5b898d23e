use std::time::Duration;

/// Tunables for one harvester run, analogous to the per-harvest-type
/// settings the original stream controller writes into a harvest's config
/// file.
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Number of attempts at `harvest_seeds` before giving up and reporting
    /// `completed failure`.
    pub tries: u32,
    /// Non-stream harvests only: ask the proxy to roll the WARC over on
    /// this interval even within a single `harvest_seeds` call.
    pub warc_rollover_secs: Option<u64>,
    /// Stream harvests only: how often the rollover timer fires the
    /// stop-producer notification to force a fresh proxy and WARC.
    pub stream_restart_interval_secs: Option<u64>,
    /// How often the temp directory is scanned for newly closed WARCs.
    pub queue_warc_files_interval: Duration,
    pub proxy_shutdown_grace: Duration,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            tries: 3,
            warc_rollover_secs: None,
            stream_restart_interval_secs: None,
            queue_warc_files_interval: Duration::from_secs(30),
            proxy_shutdown_grace: Duration::from_secs(10),
        }
    }
}
