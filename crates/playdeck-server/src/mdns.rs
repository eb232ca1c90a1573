//! mDNS advertisement for session-host discovery.
//!
//! Publishes the API address under the playdeck service type so controllers
//! can resolve the host by instance name.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceInfo};

pub(crate) const SERVICE_TYPE: &str = "_playdeck._tcp.local.";

const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Handle for an active mDNS advertisement.
pub(crate) struct MdnsAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

/// Start advertising the session host. Failures log and return `None`.
pub(crate) fn advertise(instance_name: &str, http_bind: SocketAddr) -> Option<MdnsAdvertiser> {
    let daemon = match ServiceDaemon::new() {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "mdns: daemon start failed");
            return None;
        }
    };
    let host_base = std::env::var("HOSTNAME")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().to_string());
    let host = if host_base.ends_with(".local.") {
        host_base.clone()
    } else {
        format!("{host_base}.local.")
    };
    let properties: std::collections::HashMap<String, String> = [
        ("name".to_string(), instance_name.to_string()),
        ("api_port".to_string(), http_bind.port().to_string()),
    ]
    .into_iter()
    .collect();
    let ip = if http_bind.ip().is_unspecified() {
        local_ip().unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
    } else {
        http_bind.ip()
    };
    let info = ServiceInfo::new(
        SERVICE_TYPE,
        instance_name,
        &host,
        ip,
        http_bind.port(),
        properties,
    )
    .ok()?;
    let fullname = info.get_fullname().to_string();
    if let Err(e) = daemon.register(info) {
        tracing::warn!(error = %e, "mdns: register failed");
        return None;
    }
    tracing::info!(
        instance = %instance_name,
        http_addr = %SocketAddr::new(ip, http_bind.port()),
        "mdns: advertised session host"
    );
    Some(MdnsAdvertiser { daemon, fullname })
}

/// Advertise now and keep the registration fresh on a background thread.
///
/// The returned handle lets the shutdown path unregister the service.
pub(crate) fn spawn_advertise_loop(
    instance_name: String,
    http_bind: SocketAddr,
) -> Arc<Mutex<Option<MdnsAdvertiser>>> {
    let handle: Arc<Mutex<Option<MdnsAdvertiser>>> = Arc::new(Mutex::new(None));
    if let Ok(mut g) = handle.lock() {
        *g = advertise(&instance_name, http_bind);
    }
    {
        let handle = handle.clone();
        std::thread::spawn(move || {
            loop {
                std::thread::sleep(REFRESH_INTERVAL);
                if let Ok(mut g) = handle.lock() {
                    if let Some(ad) = g.as_ref() {
                        ad.shutdown();
                    }
                    *g = advertise(&instance_name, http_bind);
                }
            }
        });
    }
    handle
}

impl MdnsAdvertiser {
    /// Unregister and shutdown the mDNS daemon.
    pub(crate) fn shutdown(&self) {
        if let Ok(rx) = self.daemon.unregister(&self.fullname) {
            let _ = rx.recv_timeout(Duration::from_secs(1));
        }
        if let Ok(rx) = self.daemon.shutdown() {
            let _ = rx.recv_timeout(Duration::from_secs(1));
        }
    }
}

/// Determine a best-effort local IP for advertisement.
fn local_ip() -> Option<std::net::IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    if socket.connect("8.8.8.8:80").is_err() && socket.connect("1.1.1.1:80").is_err() {
        return None;
    }
    socket.local_addr().ok().map(|addr| addr.ip())
}
