//! # parlor-demo
//!
//! Headless run of the message view against the in-memory backend.
//!
//! It joins a channel with generated history, sends a message, pages in
//! backlog, and logs what the view ends up showing. Useful for checking the
//! logging filter and the config file without a UI toolkit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use parlor_client::logging::init_logging;
use parlor_client::mock::{generate_history, MockMessenger};
use parlor_client::scheduler::{self, UiLoop};
use parlor_client::{MessageView, NullWidget, ViewConfig, ViewEvent, ViewHooks};
use parlor_shared::Author;
use parlor_store::Record;
use tokio::runtime::Handle;
use tracing::{info, warn};

const HISTORY: usize = 60;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Logs every view event instead of showing it.
struct LogHooks;

impl ViewHooks for LogHooks {
    fn emit(&self, event: ViewEvent) {
        match event {
            ViewEvent::Error { message } => warn!(%message, "View error"),
            ViewEvent::TypingChanged { label, empty: false } => info!(%label, "Typing"),
            other => info!(event = ?other, "View event"),
        }
    }
}

fn load_config() -> ViewConfig {
    let loaded = ViewConfig::default_path().and_then(|path| {
        if path.exists() {
            ViewConfig::load_with_env(&path)
        } else {
            let mut config = ViewConfig::default();
            config.apply_env();
            config.validate().map(|()| config)
        }
    });
    match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to default view config");
            ViewConfig::default()
        }
    }
}

/// Turn the UI loop until `done` holds or the timeout elapses.
async fn settle<F>(ui_loop: &mut UiLoop<MessageView>, view: &mut MessageView, done: F) -> anyhow::Result<()>
where
    F: Fn(&MessageView) -> bool,
{
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done(view) {
            if !ui_loop.turn(view).await {
                break;
            }
        }
    })
    .await
    .context("view did not settle")
}

fn log_rows(view: &MessageView) {
    for row in view.list().store().iter() {
        let message = row.state().message();
        info!(
            id = %row.id(),
            author = %message.author.name.content,
            variant = ?row.variant(),
            content = %message.content.content,
            "Row"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    info!("Starting parlor demo v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    info!(?config, "Loaded configuration");

    let me = Author::new("me", "Me");
    let authors = [me.clone(), Author::new("ana", "Ana"), Author::new("bo", "Bo")];
    let start = Utc::now() - chrono::Duration::hours(1);
    let backend = MockMessenger::new(me.clone())
        .with_history(generate_history(HISTORY, &authors, start, 30));

    let (ui, mut ui_loop) = scheduler::channel(Handle::current());
    let mut view = MessageView::new(ui, config, Box::new(NullWidget), Box::new(LogHooks));
    view.set_self(me);

    view.join(Arc::new(backend.clone()));
    settle(&mut ui_loop, &mut view, |view| !view.list().is_empty()).await?;
    info!(rows = view.list().len(), "Joined");

    view.input_mut().set_text("hello from the demo");
    view.send_input()?;
    settle(&mut ui_loop, &mut view, |view| {
        view.list().store().iter().all(|row| !row.id().is_empty())
    })
    .await?;
    info!(rows = view.list().len(), "Send confirmed");

    let before = view.list().len();
    if view.request_backlog() {
        settle(&mut ui_loop, &mut view, |view| !view.list().backlog_in_progress()).await?;
    }
    info!(
        loaded = view.list().len().saturating_sub(before),
        calls = backend.backlog_calls(),
        "Backlog"
    );

    log_rows(&view);
    view.leave();
    ui_loop.run_pending(&mut view);
    info!("Left channel");

    Ok(())
}
