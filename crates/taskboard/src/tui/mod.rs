use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use taskboard_app::{BoardController, NoticeReceiver};
use taskboard_core::NewTask;
use tokio::runtime::Runtime;
use tracing::subscriber::NoSubscriber;

use crate::commands::FileBackend;

pub mod constants;
mod ui;
mod view;

use self::constants::TUI_TICK_RATE_MS;
use self::view::{Ui, UiAction};

/// Launch the interactive TUI.
pub fn run(
    runtime: &Runtime,
    controller: &BoardController<FileBackend>,
    notices: NoticeReceiver,
) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let result = tracing::subscriber::with_default(NoSubscriber::default(), || {
        run_event_loop(&mut terminal, runtime, controller, notices)
    });

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &Runtime,
    controller: &BoardController<FileBackend>,
    mut notices: NoticeReceiver,
) -> Result<()> {
    runtime.block_on(controller.refetch());
    let mut ui = Ui::new(controller.snapshot());

    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(TUI_TICK_RATE_MS);

    loop {
        ui.set_board(controller.snapshot());
        while let Ok(notice) = notices.try_recv() {
            ui.error(notice.to_string());
        }

        terminal.draw(|f| ui.draw(f))?;
        if ui.should_quit {
            break;
        }

        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or_default();

        if event::poll(timeout)?
            && let CrosstermEvent::Key(key) = event::read()?
            && let Some(action) = ui.handle_key(key)
        {
            dispatch(runtime, controller, &mut ui, action);
        }

        if last_tick.elapsed() >= tick_rate {
            ui.tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

/// Start the controller operation behind `action`.
///
/// Local effects (the optimistic change, or an in-column reorder) show up on
/// the next snapshot; failures come back through the notice channel.
fn dispatch(
    runtime: &Runtime,
    controller: &BoardController<FileBackend>,
    ui: &mut Ui,
    action: UiAction,
) {
    let worker = controller.clone();
    match action {
        UiAction::Drop(commit) => {
            runtime.spawn(async move {
                let _ = worker.handle_drop(&commit).await;
            });
        }
        UiAction::AddTask { section, title } => {
            match controller.stage_task(NewTask::new(section, title)) {
                Some(staged) => {
                    runtime.spawn(async move {
                        let _ = worker.confirm_task(staged).await;
                    });
                }
                None => ui.error("Task could not be added"),
            }
        }
        UiAction::AddSection { title } => {
            runtime.spawn(async move {
                let _ = worker.create_section(&title).await;
            });
        }
        UiAction::RenameSection { section, title } => {
            runtime.spawn(async move {
                let _ = worker.rename_section(&section, &title).await;
            });
        }
        UiAction::DeleteSection { section } => {
            runtime.spawn(async move {
                let _ = worker.delete_section(&section).await;
            });
        }
        UiAction::ToggleTask { task } => {
            runtime.spawn(async move {
                let _ = worker.toggle_complete(&task).await;
            });
        }
        UiAction::DeleteTask { task } => {
            runtime.spawn(async move {
                let _ = worker.delete_task(&task).await;
            });
        }
        UiAction::Refresh => {
            runtime.spawn(async move {
                worker.refetch().await;
            });
        }
    }
}
