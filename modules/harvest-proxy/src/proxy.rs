use std::net::TcpListener;
use std::path::PathBuf;

use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};

/// Environment variables the wrapper owns for the lifetime of a scope. Since
/// these are process-wide, only one `RecordingProxy` may be live per process
/// at a time — the harvester runtime upholds that by never starting a second
/// one before the first's guard is dropped or shut down.
const HTTP_PROXY_VAR: &str = "HTTP_PROXY";
const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";
const CA_BUNDLE_VAR: &str = "REQUESTS_CA_BUNDLE";

struct SavedEnv {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
    ca_bundle: Option<String>,
}

impl SavedEnv {
    fn capture() -> Self {
        Self {
            http_proxy: std::env::var(HTTP_PROXY_VAR).ok(),
            https_proxy: std::env::var(HTTPS_PROXY_VAR).ok(),
            ca_bundle: std::env::var(CA_BUNDLE_VAR).ok(),
        }
    }

    fn restore(self) {
        restore_var(HTTP_PROXY_VAR, self.http_proxy);
        restore_var(HTTPS_PROXY_VAR, self.https_proxy);
        restore_var(CA_BUNDLE_VAR, self.ca_bundle);
    }
}

fn restore_var(name: &str, value: Option<String>) {
    match value {
        Some(v) => std::env::set_var(name, v),
        None => std::env::remove_var(name),
    }
}

/// Entry point: acquire a scoped recording proxy.
pub struct RecordingProxy;

impl RecordingProxy {
    /// Pick a free port, mint a temporary CA, spawn the proxy process, and
    /// export `HTTP_PROXY`/`HTTPS_PROXY`/`REQUESTS_CA_BUNDLE` for the
    /// duration of the returned guard's scope.
    pub async fn start(config: ProxyConfig) -> Result<RecordingProxyGuard> {
        std::fs::create_dir_all(&config.warc_dir).map_err(|e| ProxyError::Other(e.into()))?;

        let port = find_free_port(&config.port_range)?;
        let ca_dir = TempDir::new().map_err(ProxyError::CaDir)?;
        let ca_bundle_path = ca_dir.path().join("proxy-ca.pem");

        let mut cmd = Command::new(&config.command);
        cmd.arg("--port").arg(port.to_string());
        cmd.arg("--cadir").arg(ca_dir.path());
        cmd.arg("--dir").arg(&config.warc_dir);
        cmd.arg("--prefix").arg(&config.prefix);
        if config.gzip {
            cmd.arg("--gzip");
        }
        if let Some(secs) = config.rollover_secs {
            cmd.arg("--rollover-time").arg(secs.to_string());
        }
        cmd.arg("--no-dedup");
        cmd.arg("--no-stats");
        cmd.kill_on_drop(true);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::null());
        cmd.stderr(std::process::Stdio::null());

        info!(
            port,
            warc_dir = %config.warc_dir.display(),
            prefix = %config.prefix,
            "starting recording proxy"
        );

        let child = cmd.spawn().map_err(ProxyError::Spawn)?;

        let saved_env = SavedEnv::capture();
        let proxy_url = format!("http://127.0.0.1:{port}");
        std::env::set_var(HTTP_PROXY_VAR, &proxy_url);
        std::env::set_var(HTTPS_PROXY_VAR, &proxy_url);
        std::env::set_var(CA_BUNDLE_VAR, &ca_bundle_path);

        Ok(RecordingProxyGuard {
            child: Some(child),
            ca_dir: Some(ca_dir),
            saved_env: Some(saved_env),
            port,
            ca_bundle_path,
            shutdown_grace: config.shutdown_grace,
            interrupt_on_shutdown: config.interrupt_on_shutdown,
        })
    }
}

fn find_free_port(range: &crate::config::PortRange) -> Result<u16> {
    for port in range.start..=range.end {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(ProxyError::NoFreePort {
        start: range.start,
        end: range.end,
    })
}

/// Scoped handle to a running recording proxy. Dropping it best-effort kills
/// the child process and restores the ambient env vars synchronously;
/// callers that can `await` should prefer the explicit [`shutdown`] for a
/// graceful terminate-then-kill sequence.
///
/// [`shutdown`]: RecordingProxyGuard::shutdown
pub struct RecordingProxyGuard {
    child: Option<Child>,
    ca_dir: Option<TempDir>,
    saved_env: Option<SavedEnv>,
    port: u16,
    ca_bundle_path: PathBuf,
    shutdown_grace: Duration,
    interrupt_on_shutdown: bool,
}

impl RecordingProxyGuard {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ca_bundle_path(&self) -> &PathBuf {
        &self.ca_bundle_path
    }

    /// Terminate the proxy gracefully, killing it after `shutdown_grace` if
    /// it has not exited, then remove the CA temp directory and restore the
    /// env vars this scope had overridden.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if self.interrupt_on_shutdown {
                debug!("interrupting in-flight requests on stream proxy shutdown");
            }
            if let Some(pid) = child.id() {
                unsafe_terminate(pid);
            }

            match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(%status, "recording proxy exited");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "error waiting for recording proxy to exit");
                }
                Err(_) => {
                    warn!("recording proxy did not exit within grace period, killing");
                    let _ = child.kill().await;
                }
            }
        }

        if let Some(env) = self.saved_env.take() {
            env.restore();
        }
        self.ca_dir.take();
        Ok(())
    }
}

impl Drop for RecordingProxyGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Some(pid) = child.id() {
                unsafe_terminate(pid);
            }
            let _ = child.start_kill();
        }
        if let Some(env) = self.saved_env.take() {
            env.restore();
        }
    }
}

#[cfg(unix)]
fn unsafe_terminate(pid: u32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGTERM,
    );
}

#[cfg(not(unix))]
fn unsafe_terminate(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortRange;

    #[test]
    fn find_free_port_stays_in_range() {
        let range = PortRange {
            start: 27500,
            end: 27510,
        };
        let port = find_free_port(&range).unwrap();
        assert!(port >= range.start && port <= range.end);
    }

    #[test]
    fn find_free_port_errors_when_range_is_exhausted() {
        // Bind every port in a tiny range ourselves so none are free.
        let range = PortRange {
            start: 27700,
            end: 27701,
        };
        let _l1 = TcpListener::bind(("127.0.0.1", range.start)).unwrap();
        let _l2 = TcpListener::bind(("127.0.0.1", range.end)).unwrap();
        let err = find_free_port(&range).unwrap_err();
        assert!(matches!(err, ProxyError::NoFreePort { .. }));
    }
}
