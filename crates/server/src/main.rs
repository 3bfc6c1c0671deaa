mod config;
mod events;
mod server;
mod tui;

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::HostConfig;
use server::GameHost;
use treads::NetworkConfig;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "treads-server")]
#[command(about = "Hosts a Treads game on the local network")]
struct Args {
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    #[arg(short, long, default_value_t = treads::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "Host")]
    name: String,

    #[arg(short, long, default_value_t = 5, help = "Countdown before the first tick")]
    countdown: u32,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Do not announce the game on the LAN")]
    no_beacon: bool,

    #[arg(long, help = "Address to put in LAN announcements")]
    advertise: Option<IpAddr>,

    #[arg(long, help = "Start the game once this many clients have joined")]
    auto_start: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = HostConfig {
        name: args.name,
        network: NetworkConfig {
            bind_address: args.bind,
            port: args.port,
            ..NetworkConfig::default()
        },
        countdown_secs: args.countdown,
        advertise: !args.no_beacon,
        advertised_address: args.advertise,
        auto_start: args.auto_start,
    };

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let mut host = GameHost::new(config)?;
        log::info!("Server started on {}", host.local_addr());
        host.run();
        log::info!("Server shutting down");
    } else {
        let mut host = GameHost::new(config)?;
        run_with_tui(&mut host)?;
    }

    Ok(())
}

fn run_with_tui(host: &mut GameHost) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = host.running();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!("Server started on {}", host.local_addr()));

    while running.load(Ordering::SeqCst) {
        host.tick_once();

        for event in host.drain_events() {
            if event.is_error() {
                tui_state.log_error(event.describe());
            } else {
                tui_state.log_info(event.describe());
            }
        }

        if event::poll(Duration::from_millis(1))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if tui_state.is_typing() {
                match key.code {
                    KeyCode::Esc => tui_state.cancel_chat(),
                    KeyCode::Enter => {
                        if let Some(line) = tui_state.submit_chat() {
                            host.send_chat(&line);
                        }
                    }
                    KeyCode::Backspace => tui_state.backspace(),
                    KeyCode::Char(c) => tui_state.type_char(c),
                    _ => {}
                }
            } else {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        running.store(false, Ordering::SeqCst);
                    }
                    KeyCode::Char('s') => {
                        if host.client_count() == 0 {
                            tui_state.log_warn("Wait for at least one player before starting");
                        } else {
                            host.start_game();
                        }
                    }
                    KeyCode::Char('t') => tui_state.begin_chat(),
                    KeyCode::PageUp => tui_state.scroll_up(),
                    KeyCode::PageDown => tui_state.scroll_down(),
                    KeyCode::End => tui_state.scroll_to_bottom(),
                    _ => {}
                }
            }
        }

        let stats = host.stats();
        let peers = host.peers();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &peers, host.lobby());
        })?;
    }

    tui_state.log_info("Shutting down...");
    host.shutdown();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
