//! Interactive shell.
//!
//! Three controls over the resolved session host ([P]lay / [Space] Pause /
//! [N] Skip), a polled status panel, and a transient notice area fed by the
//! connectivity watcher. The session resolves in the background; controls
//! report "not ready" until it does.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};

use playdeck_types::{PlayableItem, PlaybackEndReason, PlayerStatus};

use crate::cli;
use crate::connectivity;
use crate::controller::{self, ResolveSpec, SessionHandle, SessionPromise};

const NOTICE_TTL: Duration = Duration::from_secs(4);

enum SessionState {
    Resolving,
    Ready(SessionHandle),
    Failed(String),
}

/// In-memory UI state for rendering + interaction.
struct App {
    session: SessionState,
    status: Option<PlayerStatus>,
    notice: Option<(String, Instant)>,
}

impl App {
    fn new() -> Self {
        Self {
            session: SessionState::Resolving,
            status: None,
            notice: Some(("Resolving session host".to_string(), Instant::now())),
        }
    }

    fn push_notice(&mut self, text: String) {
        self.notice = Some((text, Instant::now()));
    }

    fn expire_notice(&mut self) {
        if let Some((_, since)) = self.notice.as_ref() {
            if since.elapsed() >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }

    fn current_notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(text, _)| text.as_str())
    }

    fn play(&mut self) {
        let SessionState::Ready(handle) = &self.session else {
            self.push_notice("Session not ready".to_string());
            return;
        };
        let item = PlayableItem::from_locator(cli::DEMO_STREAM);
        match handle.submit(vec![item]) {
            Ok(()) => self.push_notice("Submitted demo stream".to_string()),
            Err(e) => self.push_notice(format!("Play failed: {e:#}")),
        }
    }

    fn pause(&mut self) {
        let SessionState::Ready(handle) = &self.session else {
            self.push_notice("Session not ready".to_string());
            return;
        };
        match handle.pause() {
            Ok(()) => self.push_notice("Paused".to_string()),
            Err(e) => self.push_notice(format!("Pause failed: {e:#}")),
        }
    }

    /// The skip control never reaches the server.
    fn skip(&mut self) {
        self.push_notice(cli::SKIP_NOTICE.to_string());
    }
}

/// Launch the shell and drive the event loop until quit.
pub(crate) fn run_tui(spec: ResolveSpec) -> Result<()> {
    let mut promise = controller::resolve(spec);
    let (status_tx, status_rx) = unbounded();
    let mut app = App::new();

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app, &mut promise, status_tx, status_rx);
    restore_terminal(&mut term)?;
    result
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    promise: &mut SessionPromise,
    status_tx: Sender<PlayerStatus>,
    status_rx: Receiver<PlayerStatus>,
) -> Result<()> {
    let tick = Duration::from_millis(100);
    let mut notices: Option<Receiver<&'static str>> = None;

    loop {
        if matches!(app.session, SessionState::Resolving) {
            if let Some(result) = promise.try_get() {
                match result {
                    Ok(handle) => {
                        spawn_status_poller(handle.clone(), status_tx.clone());
                        notices = host_target(&handle.base_url).map(connectivity::spawn_watcher);
                        app.push_notice(format!("Session ready: {}", handle.session_id));
                        app.session = SessionState::Ready(handle);
                    }
                    Err(e) => {
                        app.push_notice("Session resolve failed".to_string());
                        app.session = SessionState::Failed(e);
                    }
                }
            }
        }

        while let Ok(status) = status_rx.try_recv() {
            app.status = Some(status);
        }
        if let Some(rx) = notices.as_ref() {
            while let Ok(notice) = rx.try_recv() {
                app.push_notice(notice.to_string());
            }
        }
        app.expire_notice();

        terminal.draw(|f| draw(f, app))?;

        if event::poll(tick).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('p') | KeyCode::Char('P') => app.play(),
                    KeyCode::Char(' ') => app.pause(),
                    KeyCode::Char('n') | KeyCode::Char('N') => app.skip(),
                    _ => {}
                }
            }
        }
    }
}

/// Poll the host's status with backoff while it is unreachable.
fn spawn_status_poller(handle: SessionHandle, tx: Sender<PlayerStatus>) {
    std::thread::spawn(move || {
        let mut delay = Duration::from_millis(250);
        loop {
            std::thread::sleep(delay);
            match handle.status() {
                Ok(status) => {
                    delay = Duration::from_millis(250);
                    if tx.send(status).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        }
    });
}

/// Reachability target for the connectivity watcher: the host part of the
/// resolved base URL.
fn host_target(base_url: &str) -> Option<SocketAddr> {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))?;
    let authority = rest.split('/').next().unwrap_or(rest);
    authority.to_socket_addrs().ok()?.next()
}

fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let session_line = match &app.session {
        SessionState::Resolving => "session: resolving...".to_string(),
        SessionState::Ready(handle) => {
            format!("session: {} @ {}", handle.session_id, handle.base_url)
        }
        SessionState::Failed(e) => format!("session: failed ({e})"),
    };
    let header = Paragraph::new(vec![
        Line::from(session_line),
        Line::from("[P] Play    [Space] Pause    [N] Skip").style(
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ])
    .block(Block::default().borders(Borders::ALL).title("playdeck"));
    f.render_widget(header, chunks[0]);

    let status_lines = match app.status.as_ref() {
        Some(status) => status_panel_lines(status),
        None => vec![Line::from("no status yet")],
    };
    let status_panel = Paragraph::new(status_lines)
        .block(Block::default().borders(Borders::ALL).title("Now Playing"));
    f.render_widget(status_panel, chunks[1]);

    let notice_line = app.current_notice().unwrap_or("").to_string();
    let notices = Paragraph::new(Line::from(notice_line))
        .block(Block::default().borders(Borders::ALL).title("Notices"));
    f.render_widget(notices, chunks[2]);

    f.render_widget(
        Paragraph::new(Line::from("keys: p play | space pause | n skip | q quit")),
        chunks[3],
    );
}

fn status_panel_lines(status: &PlayerStatus) -> Vec<Line<'static>> {
    let item = status.now_playing.as_deref().unwrap_or("-");
    let state = playback_state_line(status);
    let device = status.device.as_deref().unwrap_or("-");
    let codec = status.source_codec.as_deref().unwrap_or("-");
    vec![
        Line::from(format!("item: {item}")),
        Line::from(state),
        Line::from(format!("device: {device}")),
        Line::from(format!("codec: {codec}")),
    ]
}

fn playback_state_line(status: &PlayerStatus) -> String {
    if status.now_playing.is_none() {
        return match status.end_reason {
            Some(reason) => format!("state: idle (last: {})", end_reason_label(reason)),
            None => "state: idle".to_string(),
        };
    }
    let state = if status.paused { "paused" } else { "playing" };
    match (status.elapsed_ms, status.duration_ms) {
        (Some(elapsed), Some(total)) if total > 0 => format!(
            "state: {state} {} / {}",
            format_duration_ms(elapsed),
            format_duration_ms(total)
        ),
        (Some(elapsed), _) => format!("state: {state} {}", format_duration_ms(elapsed)),
        _ => format!("state: {state}"),
    }
}

fn end_reason_label(reason: PlaybackEndReason) -> &'static str {
    match reason {
        PlaybackEndReason::Eof => "eof",
        PlaybackEndReason::Error => "error",
        PlaybackEndReason::Stopped => "stopped",
    }
}

fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{mins}:{secs:02}")
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_shows_refusal_without_a_session() {
        let mut app = App::new();
        app.skip();
        assert_eq!(app.current_notice(), Some(cli::SKIP_NOTICE));
        assert!(matches!(app.session, SessionState::Resolving));
    }

    #[test]
    fn play_before_resolve_reports_not_ready() {
        let mut app = App::new();
        app.play();
        assert_eq!(app.current_notice(), Some("Session not ready"));
    }

    #[test]
    fn notice_expires_after_ttl() {
        let mut app = App::new();
        app.push_notice("hello".to_string());
        assert_eq!(app.current_notice(), Some("hello"));

        app.notice = Some(("hello".to_string(), Instant::now() - NOTICE_TTL));
        app.expire_notice();
        assert!(app.current_notice().is_none());
    }

    #[test]
    fn host_target_parses_resolved_base_url() {
        assert_eq!(
            host_target("http://127.0.0.1:5800"),
            Some("127.0.0.1:5800".parse().unwrap())
        );
        assert!(host_target("not a url").is_none());
    }

    #[test]
    fn idle_state_line_carries_end_reason() {
        let status = PlayerStatus {
            end_reason: Some(PlaybackEndReason::Eof),
            ..PlayerStatus::default()
        };
        assert_eq!(playback_state_line(&status), "state: idle (last: eof)");
    }

    #[test]
    fn playing_state_line_formats_progress() {
        let status = PlayerStatus {
            now_playing: Some("https://example.org/a.ogg".to_string()),
            elapsed_ms: Some(62_000),
            duration_ms: Some(190_000),
            ..PlayerStatus::default()
        };
        assert_eq!(playback_state_line(&status), "state: playing 1:02 / 3:10");
    }
}
