pub mod config;
pub mod error;
pub mod proxy;

pub use config::{PortRange, ProxyConfig};
pub use error::{ProxyError, Result};
pub use proxy::{RecordingProxy, RecordingProxyGuard};
