//! Network reachability watcher.
//!
//! Probes a target address on a fixed interval and turns reachability
//! changes into transient notices for the interactive shell. Only the first
//! observation and actual changes emit a notice.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

pub(crate) const ONLINE_NOTICE: &str = "Network is online";
pub(crate) const OFFLINE_NOTICE: &str = "Network is unavailable";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the watcher thread. Notices arrive on the returned channel; the
/// thread stops once the receiver is gone.
pub(crate) fn spawn_watcher(target: SocketAddr) -> Receiver<&'static str> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || watcher_main(target, tx, PROBE_INTERVAL));
    rx
}

fn watcher_main(target: SocketAddr, tx: Sender<&'static str>, interval: Duration) {
    let mut last: Option<bool> = None;
    loop {
        let online = probe(target, PROBE_TIMEOUT);
        if last != Some(online) {
            last = Some(online);
            let notice = notice_for(online);
            tracing::info!(target = %target, online, "{notice}");
            if tx.send(notice).is_err() {
                return;
            }
        }
        std::thread::sleep(interval);
    }
}

fn notice_for(online: bool) -> &'static str {
    if online { ONLINE_NOTICE } else { OFFLINE_NOTICE }
}

fn probe(target: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&target, timeout).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn spawn_fast_watcher(target: SocketAddr) -> Receiver<&'static str> {
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::spawn(move || watcher_main(target, tx, Duration::from_millis(10)));
        rx
    }

    #[test]
    fn first_observation_reports_online_for_reachable_target() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr().unwrap();

        let notices = spawn_fast_watcher(target);
        let first = notices.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, ONLINE_NOTICE);

        // Stable reachability stays quiet.
        assert!(notices.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn first_observation_reports_offline_for_unreachable_target() {
        // Bind then drop to find a port with nothing listening.
        let target = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let notices = spawn_fast_watcher(target);
        let first = notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, OFFLINE_NOTICE);
    }

    #[test]
    fn change_emits_exactly_one_notice() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr().unwrap();

        let notices = spawn_fast_watcher(target);
        assert_eq!(
            notices.recv_timeout(Duration::from_secs(2)).unwrap(),
            ONLINE_NOTICE
        );

        drop(listener);
        assert_eq!(
            notices.recv_timeout(Duration::from_secs(5)).unwrap(),
            OFFLINE_NOTICE
        );
        assert!(notices.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
