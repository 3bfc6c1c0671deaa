use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};
use treads::{Lobby, LobbyState, PeerInfo};

use crate::server::HostStats;

const HELP_LINE: &str = "'s' start game  |  't' chat  |  PgUp/PgDn scroll  |  'q' or ESC quit";

const MAX_LOG_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct TuiState {
    log: VecDeque<(LogLevel, String)>,
    scroll: usize,
    chat_input: Option<String>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            log: VecDeque::new(),
            scroll: 0,
            chat_input: None,
        }
    }

    fn push(&mut self, level: LogLevel, line: String) {
        if self.log.len() == MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, line));
    }

    pub fn log_info(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Info, line.into());
    }

    pub fn log_warn(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Warn, line.into());
    }

    pub fn log_error(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Error, line.into());
    }

    pub fn scroll_up(&mut self) {
        self.scroll = (self.scroll + 5).min(self.log.len());
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_sub(5);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    pub fn is_typing(&self) -> bool {
        self.chat_input.is_some()
    }

    pub fn begin_chat(&mut self) {
        self.chat_input = Some(String::new());
    }

    pub fn type_char(&mut self, c: char) {
        if let Some(input) = self.chat_input.as_mut() {
            input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(input) = self.chat_input.as_mut() {
            input.pop();
        }
    }

    pub fn cancel_chat(&mut self) {
        self.chat_input = None;
    }

    /// Ends chat entry, returning the line unless it was blank.
    pub fn submit_chat(&mut self) -> Option<String> {
        self.chat_input.take().filter(|line| !line.trim().is_empty())
    }
}

pub fn render(
    frame: &mut Frame,
    state: &TuiState,
    stats: &HostStats,
    peers: &[PeerInfo],
    lobby: &Lobby,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length((peers.len() as u16 + 3).min(12)),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats, lobby);
    render_network(frame, chunks[1], stats);
    render_players(frame, chunks[2], peers, lobby);
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4], state);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &HostStats, lobby: &Lobby) {
    let title = format!(
        " {} - Uptime: {} ",
        lobby.local_name(),
        format_duration(stats.uptime_secs)
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let phase = match (stats.lobby_state, stats.countdown) {
        (LobbyState::Countdown, Some(left)) => format!("Starting in {}s", left.as_secs() + 1),
        (LobbyState::Countdown, None) | (LobbyState::Waiting, _) => {
            "Waiting for players".to_string()
        }
        (LobbyState::InGame, _) => "In game".to_string(),
    };
    let text = format!(
        "Tick: {}  |  Clients: {}  |  Entities: {}  |  {}",
        stats.tick, stats.client_count, stats.entity_count, phase
    );

    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::White)),
        area,
    );
}

fn render_network(frame: &mut Frame, area: Rect, stats: &HostStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &stats.network_stats;
    let lines = vec![
        Line::from(vec![
            Span::styled("Frames: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv", net.frames_sent, net.frames_received),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_players(frame: &mut Frame, area: Rect, peers: &[PeerInfo], lobby: &Lobby) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let rows = peers.iter().map(|peer| {
        let name = peer
            .identity
            .as_ref()
            .map(|identity| identity.name.as_str())
            .unwrap_or("(connecting)");
        let color = peer
            .identity
            .as_ref()
            .map(|identity| identity.color.as_str())
            .unwrap_or("-");
        let ready = lobby
            .players()
            .iter()
            .any(|player| player.name == name && player.ready);
        let status = match (peer.open, ready) {
            (false, _) => "gone",
            (true, true) => "ready",
            (true, false) => "lobby",
        };
        let style = if peer.open {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Row::new(vec![
            peer.peer.index().to_string(),
            name.to_string(),
            color.to_string(),
            peer.remote_addr.to_string(),
            status.to_string(),
            format!(
                "{} / {}",
                format_bytes(peer.stats.bytes_sent),
                format_bytes(peer.stats.bytes_received)
            ),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(16),
            Constraint::Length(8),
            Constraint::Length(22),
            Constraint::Length(7),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["#", "Name", "Color", "Address", "State", "Out / In"])
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
    )
    .block(block);

    frame.render_widget(table, area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let end = state.log.len().saturating_sub(state.scroll);
    let start = end.saturating_sub(visible);
    let lines: Vec<Line> = state
        .log
        .range(start..end)
        .map(|(level, text)| {
            let color = match level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(Span::styled(text.as_str(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = match &state.chat_input {
        Some(input) => {
            Paragraph::new(format!("Say: {input}_")).style(Style::default().fg(Color::White))
        }
        None => Paragraph::new(HELP_LINE).style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ),
    };

    frame.render_widget(text.block(block), area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
