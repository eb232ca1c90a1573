//! Session-host discovery.
//!
//! Browses the playdeck service type and picks a host by its advertised
//! instance name. Resolution is one-shot: browse until a match or the
//! timeout, then shut the daemon down.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use mdns_sd::{ServiceDaemon, ServiceEvent};

pub(crate) const SERVICE_TYPE: &str = "_playdeck._tcp.local.";

const BROWSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Browse for a session host and return its base URL.
///
/// With `instance` set, only a host advertising that name matches
/// (case-insensitive); otherwise the first resolved host wins.
pub(crate) fn resolve_base_url(instance: Option<&str>) -> Result<String> {
    let addr = browse_host(instance, BROWSE_TIMEOUT)?;
    Ok(format!("http://{addr}"))
}

fn browse_host(instance: Option<&str>, timeout: Duration) -> Result<SocketAddr> {
    let daemon = ServiceDaemon::new().context("start mdns daemon")?;
    let receiver = daemon.browse(SERVICE_TYPE).context("browse mdns")?;
    tracing::info!(service = SERVICE_TYPE, instance = ?instance, "mdns: browsing");

    let deadline = Instant::now() + timeout;
    let mut found = None;
    while found.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let event = match receiver.recv_timeout(remaining) {
            Ok(event) => event,
            Err(_) => break,
        };
        let ServiceEvent::ServiceResolved(info) = event else {
            continue;
        };
        let name = info
            .get_property("name")
            .map(|p| p.val_str().to_string())
            .unwrap_or_else(|| info.get_fullname().to_string());
        if let Some(wanted) = instance {
            if !name.eq_ignore_ascii_case(wanted) {
                tracing::debug!(name = %name, "mdns: skipping non-matching instance");
                continue;
            }
        }
        let ip = info.get_addresses().iter().find_map(|ip| match ip {
            mdns_sd::ScopedIp::V4(v4) => Some(IpAddr::V4(*v4.addr())),
            _ => None,
        });
        let Some(ip) = ip else {
            tracing::warn!(fullname = %info.get_fullname(), "mdns: resolved without IPv4");
            continue;
        };
        tracing::info!(
            name = %name,
            ip = %ip,
            port = info.get_port(),
            "mdns: session host resolved"
        );
        found = Some(SocketAddr::new(ip, info.get_port()));
    }

    let _ = daemon.stop_browse(SERVICE_TYPE);
    let _ = daemon.shutdown();

    match found {
        Some(addr) => Ok(addr),
        None => match instance {
            Some(name) => bail!(
                "no session host named {name:?} within {}s",
                timeout.as_secs()
            ),
            None => bail!("no session host within {}s", timeout.as_secs()),
        },
    }
}
