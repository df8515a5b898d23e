use std::collections::HashMap;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SupervisorError};

/// Native stand-in for the external `supervisord` process group manager: one
/// `tokio::process::Child` per running stream harvest, tracked in an
/// in-memory table keyed by harvest id. SIGTERM/SIGUSR1 are delivered
/// directly via `nix::sys::signal::kill` rather than an XML-RPC round trip.
pub struct ProcessSupervisor {
    children: Mutex<HashMap<String, Child>>,
    shutdown_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
            shutdown_grace,
        }
    }

    /// Spawn a new process group for `id`, replacing any prior one under the
    /// same id (the caller is responsible for stopping an existing process
    /// before restarting it; this does not do so implicitly).
    pub async fn add(&self, id: &str, command: &str, args: &[String]) -> Result<()> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            id: id.to_string(),
            source,
        })?;

        info!(harvest_id = id, pid = child.id(), command, "spawned harvester process");
        self.children.lock().await.insert(id.to_string(), child);
        Ok(())
    }

    pub async fn ids(&self) -> Vec<String> {
        self.children.lock().await.keys().cloned().collect()
    }

    /// Send the pause signal (SIGUSR1) without stopping the process.
    pub async fn pause(&self, id: &str) -> Result<()> {
        let children = self.children.lock().await;
        let child = children.get(id).ok_or_else(|| SupervisorError::NotFound { id: id.to_string() })?;
        send_signal(id, child, Signal::Usr1)
    }

    pub async fn pause_all(&self) {
        let children = self.children.lock().await;
        for (id, child) in children.iter() {
            if let Err(e) = send_signal(id, child, Signal::Usr1) {
                warn!(harvest_id = id, error = %e, "failed to pause harvester process");
            }
        }
    }

    /// Send SIGTERM, wait up to `shutdown_grace` for graceful exit, kill if
    /// still running, then remove the process from the table regardless of
    /// how it exited.
    pub async fn stop(&self, id: &str) -> Result<()> {
        let mut child = {
            let mut children = self.children.lock().await;
            children
                .remove(id)
                .ok_or_else(|| SupervisorError::NotFound { id: id.to_string() })?
        };

        if let Err(e) = send_signal(id, &child, Signal::Term) {
            warn!(harvest_id = id, error = %e, "failed to signal harvester process, killing directly");
        }

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(harvest_id = id, %status, "harvester process exited"),
            Ok(Err(e)) => warn!(harvest_id = id, error = %e, "error waiting for harvester process"),
            Err(_) => {
                warn!(harvest_id = id, "harvester process did not exit within grace period, killing");
                let _ = child.kill().await;
            }
        }

        Ok(())
    }

    pub async fn stop_all(&self) {
        let ids = self.ids().await;
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                warn!(harvest_id = %id, error = %e, "failed to stop harvester process");
            }
        }
    }
}

enum Signal {
    Term,
    Usr1,
}

#[cfg(unix)]
fn send_signal(id: &str, child: &Child, signal: Signal) -> Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped; nothing to signal.
        return Ok(());
    };
    let sig = match signal {
        Signal::Term => nix::sys::signal::Signal::SIGTERM,
        Signal::Usr1 => nix::sys::signal::Signal::SIGUSR1,
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), sig).map_err(|e| {
        SupervisorError::Signal {
            id: id.to_string(),
            source: anyhow::anyhow!(e),
        }
    })
}

#[cfg(not(unix))]
fn send_signal(_id: &str, _child: &Child, _signal: Signal) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_stop_removes_from_table() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(2));
        supervisor.add("h1", "sleep", &["30".to_string()]).await.unwrap();
        assert_eq!(supervisor.ids().await, vec!["h1".to_string()]);

        supervisor.stop("h1").await.unwrap();
        assert!(supervisor.ids().await.is_empty());
    }

    #[tokio::test]
    async fn stopping_an_unknown_id_errors() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(2));
        let err = supervisor.stop("missing").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stop_all_clears_every_entry() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(2));
        supervisor.add("h1", "sleep", &["30".to_string()]).await.unwrap();
        supervisor.add("h2", "sleep", &["30".to_string()]).await.unwrap();
        supervisor.stop_all().await;
        assert!(supervisor.ids().await.is_empty());
    }
}
