//! Session controller.
//!
//! `resolve` hands back a [`SessionPromise`] immediately and finishes the
//! work on a background thread: find the session host (mDNS, unless an
//! address was given) and request a session handle from it. The promise is
//! the only way to observe the result, so callers never see a half-built
//! handle. Commands on a resolved [`SessionHandle`] are plain synchronous
//! HTTP calls.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use crossbeam_channel::Receiver;
use serde::de::DeserializeOwned;

use playdeck_types::{PlayRequest, PlayableItem, PlayerStatus, SessionInfo, SessionRequest};

use crate::discovery;

/// Session host tried when no address is given and mDNS finds nothing.
pub(crate) const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5800";

/// What the resolver needs to find a host and open a session.
#[derive(Clone, Debug)]
pub(crate) struct ResolveSpec {
    /// Explicit base URL; skips discovery entirely.
    pub(crate) server: Option<String>,
    /// Advertised instance name to match during discovery.
    pub(crate) instance: Option<String>,
    pub(crate) client_id: String,
}

/// A resolved binding to a session host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SessionHandle {
    pub(crate) base_url: String,
    pub(crate) session_id: String,
}

/// One-shot delivery of the resolver's result.
///
/// `try_get` never blocks; `wait` blocks one-shot commands until the handle
/// is ready. Once delivered, the result stays readable.
pub(crate) struct SessionPromise {
    rx: Receiver<Result<SessionHandle, String>>,
    slot: Option<Result<SessionHandle, String>>,
}

impl SessionPromise {
    fn poll(&mut self) {
        if self.slot.is_none() {
            if let Ok(result) = self.rx.try_recv() {
                self.slot = Some(result);
            }
        }
    }

    /// `None` while the resolver is still working.
    pub(crate) fn try_get(&mut self) -> Option<Result<SessionHandle, String>> {
        self.poll();
        self.slot.clone()
    }

    /// Block until the handle is ready or `timeout` passes.
    pub(crate) fn wait(&mut self, timeout: Duration) -> Result<SessionHandle> {
        if self.slot.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => self.slot = Some(result),
                Err(_) => bail!(
                    "session host did not resolve within {}s",
                    timeout.as_secs()
                ),
            }
        }
        match self.slot.as_ref() {
            Some(Ok(handle)) => Ok(handle.clone()),
            Some(Err(e)) => bail!("session resolve failed: {e}"),
            None => bail!("resolver exited without a result"),
        }
    }
}

/// Start resolving a session handle. Returns at once; failures are logged
/// and surface through the promise.
pub(crate) fn resolve(spec: ResolveSpec) -> SessionPromise {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let result = resolve_handle(&spec);
        if let Err(e) = &result {
            tracing::warn!(client_id = %spec.client_id, "session resolve failed: {e:#}");
        }
        let _ = tx.send(result.map_err(|e| format!("{e:#}")));
    });
    SessionPromise { rx, slot: None }
}

fn resolve_handle(spec: &ResolveSpec) -> Result<SessionHandle> {
    let base_url = match spec.server.as_deref() {
        Some(url) => normalize_base_url(url),
        None => match discovery::resolve_base_url(spec.instance.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                if spec.instance.is_some() {
                    return Err(e);
                }
                tracing::info!("mdns found no session host ({e:#}); trying {DEFAULT_BASE_URL}");
                DEFAULT_BASE_URL.to_string()
            }
        },
    };
    let session = create_session(&base_url, &spec.client_id)?;
    tracing::info!(
        base_url = %base_url,
        session_id = %session.session_id,
        "session ready"
    );
    Ok(SessionHandle {
        base_url,
        session_id: session.session_id,
    })
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn create_session(base_url: &str, client_id: &str) -> Result<SessionInfo> {
    let url = format!("{base_url}/sessions");
    let resp = ureq::post(&url)
        .send_json(SessionRequest {
            client_id: client_id.to_string(),
        })
        .context("request /sessions")?;
    read_json(resp, "sessions")
}

impl SessionHandle {
    /// Submit a batch for playback.
    pub(crate) fn submit(&self, items: Vec<PlayableItem>) -> Result<()> {
        let url = format!("{}/play", self.base_url);
        let resp = ureq::post(&url)
            .send_json(PlayRequest { items })
            .context("request /play")?;
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("play failed with {}", resp.status()));
        }
        Ok(())
    }

    pub(crate) fn pause(&self) -> Result<()> {
        let url = format!("{}/pause", self.base_url);
        let resp = ureq::post(&url)
            .send_empty()
            .context("request /pause")?;
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("pause failed with {}", resp.status()));
        }
        Ok(())
    }

    pub(crate) fn status(&self) -> Result<PlayerStatus> {
        let url = format!("{}/status", self.base_url);
        let resp = ureq::get(&url).call().context("request /status")?;
        read_json(resp, "status")
    }
}

fn read_json<T: DeserializeOwned>(
    mut resp: ureq::http::Response<ureq::Body>,
    label: &str,
) -> Result<T> {
    let body = resp
        .body_mut()
        .read_to_string()
        .with_context(|| format!("read /{label} response body"))?;
    serde_json::from_str(&body).with_context(|| format!("decode /{label} response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SessionHandle {
        SessionHandle {
            base_url: "http://127.0.0.1:5800".to_string(),
            session_id: "sess:test".to_string(),
        }
    }

    #[test]
    fn promise_is_pending_until_fulfilled() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut promise = SessionPromise { rx, slot: None };

        assert!(promise.try_get().is_none());

        tx.send(Ok(handle())).unwrap();
        let got = promise.try_get().unwrap().unwrap();
        assert_eq!(got.session_id, "sess:test");

        // The result stays readable after delivery.
        assert!(promise.try_get().is_some());
    }

    #[test]
    fn wait_times_out_when_never_fulfilled() {
        let (_tx, rx) = crossbeam_channel::bounded::<Result<SessionHandle, String>>(1);
        let mut promise = SessionPromise { rx, slot: None };

        let err = promise.wait(Duration::from_millis(20)).unwrap_err();
        assert!(err.to_string().contains("did not resolve"));
    }

    #[test]
    fn wait_surfaces_resolver_failure() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut promise = SessionPromise { rx, slot: None };
        tx.send(Err("no session host found".to_string())).unwrap();

        let err = promise.wait(Duration::from_millis(20)).unwrap_err();
        assert!(err.to_string().contains("no session host found"));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://10.0.0.7:5800/"),
            "http://10.0.0.7:5800"
        );
        assert_eq!(
            normalize_base_url("  http://10.0.0.7:5800  "),
            "http://10.0.0.7:5800"
        );
    }
}
