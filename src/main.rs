mod api;
mod app;
mod components;
mod config;
mod error;
mod event;
mod handler;
mod logging;
mod nav;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::api::client::HttpBackend;
use crate::app::App;
use crate::config::{AppConfig, GeneralConfig, LogConfig, ServerConfig};
use crate::error::AppError;
use crate::event::{Event, EventHandler};
use crate::nav::link::LinkParams;
use crate::tui::{install_panic_hook, Tui};

/// A terminal browser for a remote image store.
#[derive(Parser, Debug)]
#[command(name = "mimnav", version, about)]
struct Cli {
    /// Server base URL (defaults to the config file, then http://localhost:8080)
    url: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session token, sent as the MIMSRV_TOKEN cookie
    #[arg(long)]
    token: Option<String>,

    /// Path to open on startup, e.g. /2019/summer/a.jpg
    #[arg(long)]
    path: Option<String>,

    /// Channel to announce the selection on
    #[arg(long)]
    publish: Option<String>,

    /// Channel to follow
    #[arg(long)]
    subscribe: Option<String>,

    /// Deep-link query string, e.g. "path=/2019&subscribe=wall"
    #[arg(long)]
    link: Option<String>,

    /// Log filter, e.g. debug or mimnav=trace (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,

    /// Disable mouse support
    #[arg(long)]
    no_mouse: bool,
}

impl Cli {
    /// Config values set from the command line.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                url: self.url.clone(),
                token: self.token.clone(),
                ..Default::default()
            },
            general: GeneralConfig {
                mouse: self.no_mouse.then_some(false),
                ..Default::default()
            },
            log: LogConfig {
                level: self.log_level.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Where the first tab starts: config, then `--link`, then the
    /// individual flags.
    fn startup_link(&self, config: &AppConfig) -> LinkParams {
        let from_config = LinkParams {
            path: config.start_path().map(str::to_string),
            publish: config.channels.publish.clone(),
            subscribe: config.channels.subscribe.clone(),
        };
        let from_link = self
            .link
            .as_deref()
            .map(LinkParams::parse)
            .unwrap_or_default();
        let from_flags = LinkParams {
            path: self.path.clone(),
            publish: self.publish.clone(),
            subscribe: self.subscribe.clone(),
        };
        from_config.merge(from_link).merge(from_flags)
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));

    let _log_guard = logging::init(&config.log_dir(), config.log_level())?;

    let link = cli.startup_link(&config);
    if let Some(path) = link.path.as_deref().filter(|p| !p.starts_with('/')) {
        return Err(AppError::InvalidPath(format!("{} must start with '/'", path)));
    }

    let backend = HttpBackend::new(config.server_url(), config.token(), config.timeout())?;
    tracing::info!(url = %backend.base_url(), link = %link.to_query(), "starting");

    install_panic_hook();

    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(50));
    let mut app = App::new(Arc::new(backend), config, events.sender());
    app.open_tab(link);

    let result = run(&mut tui, &mut app, &mut events).await;
    tui.restore()?;
    if let Err(err) = &result {
        tracing::error!(%err, "exiting with error");
    }
    result
}

async fn run(tui: &mut Tui, app: &mut App, events: &mut EventHandler) -> error::Result<()> {
    loop {
        tui.terminal_mut().draw(|frame| {
            ui::render(app, frame);
        })?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(app, mouse),
            Event::Tick => app.clear_expired_status(),
            Event::Resize(_, _) => {}
            other => app.handle_event(other),
        }
        app.process_nav_events();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelsConfig;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "mimnav",
            "http://nas:8080",
            "--token",
            "abc",
            "--subscribe",
            "wall",
            "--no-mouse",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.server_url(), "http://nas:8080");
        assert_eq!(overrides.token(), Some("abc"));
        assert!(!overrides.mouse_enabled());
        assert_eq!(cli.subscribe.as_deref(), Some("wall"));
    }

    #[test]
    fn startup_link_layers_flags_over_link_over_config() {
        let config = AppConfig {
            general: GeneralConfig {
                start_path: Some("/from-config".into()),
                ..Default::default()
            },
            channels: ChannelsConfig {
                publish: Some("cfg".into()),
                subscribe: Some("cfg".into()),
            },
            ..Default::default()
        };
        let cli = Cli::parse_from([
            "mimnav",
            "--link",
            "path=/from-link&publish=link",
            "--publish",
            "flag",
        ]);
        let link = cli.startup_link(&config);
        assert_eq!(link.path.as_deref(), Some("/from-link"));
        assert_eq!(link.publish.as_deref(), Some("flag"));
        assert_eq!(link.subscribe.as_deref(), Some("cfg"));
    }

    #[test]
    fn no_flags_leave_config_alone() {
        let cli = Cli::parse_from(["mimnav"]);
        let overrides = cli.overrides();
        assert!(overrides.server.url.is_none());
        assert!(overrides.general.mouse.is_none());
        assert_eq!(cli.startup_link(&AppConfig::default()), LinkParams::default());
    }
}
