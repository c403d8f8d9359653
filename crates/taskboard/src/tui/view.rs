use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::style::{Color, Style};
use taskboard_core::{
    Board, Column, DragId, DragSession, DropCommit, SectionId, Task, TaskId, is_blank,
};

use super::constants::UI_MESSAGE_TTL_SECS;

/// What the text prompt is collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum InputPurpose {
    NewTask { section: SectionId },
    NewSection,
    RenameSection { section: SectionId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Input {
    pub(super) purpose: InputPurpose,
    pub(super) buffer: String,
}

impl Input {
    pub(super) const fn prompt(&self) -> &'static str {
        match self.purpose {
            InputPurpose::NewTask { .. } => "New task",
            InputPurpose::NewSection => "New section",
            InputPurpose::RenameSection { .. } => "Rename section",
        }
    }
}

/// Board operations requested by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum UiAction {
    Drop(DropCommit),
    AddTask { section: SectionId, title: String },
    AddSection { title: String },
    RenameSection { section: SectionId, title: String },
    DeleteSection { section: SectionId },
    ToggleTask { task: TaskId },
    DeleteTask { task: TaskId },
    Refresh,
}

pub(super) struct Ui {
    pub(super) board: Board,
    /// Focused column.
    pub(super) column: usize,
    /// Focused row; while dragging it may sit one past the last task.
    pub(super) row: usize,
    pub(super) drag: DragSession,
    pub(super) input: Option<Input>,
    pub(super) message: Option<Message>,
    pub(super) should_quit: bool,
}

impl Ui {
    pub(super) const fn new(board: Board) -> Self {
        Self {
            board,
            column: 0,
            row: 0,
            drag: DragSession::new(),
            input: None,
            message: None,
            should_quit: false,
        }
    }

    /// Swap in a fresh snapshot and keep the cursor inside it.
    pub(super) fn set_board(&mut self, board: Board) {
        if self.board == board {
            return;
        }
        self.board = board;
        self.clamp_cursor();
    }

    pub(super) fn focused_column(&self) -> Option<&Column> {
        self.board.columns().get(self.column)
    }

    pub(super) fn selected_task(&self) -> Option<&Task> {
        self.focused_column()
            .and_then(|column| column.tasks.get(self.row))
    }

    fn selected_task_id(&self) -> Option<TaskId> {
        self.selected_task().map(|task| task.id.clone())
    }

    /// Drag identifier of whatever the cursor rests on.
    pub(super) fn hovered(&self) -> Option<DragId> {
        let column = self.focused_column()?;
        Some(column.tasks.get(self.row).map_or_else(
            || DragId::Column(column.id().clone()),
            |task| DragId::Task(task.id.clone()),
        ))
    }

    fn row_limit(&self) -> usize {
        let len = self.focused_column().map_or(0, |column| column.tasks.len());
        if self.drag.is_active() {
            len
        } else {
            len.saturating_sub(1)
        }
    }

    fn clamp_cursor(&mut self) {
        let columns = self.board.columns().len();
        self.column = self.column.min(columns.saturating_sub(1));
        self.row = self.row.min(self.row_limit());
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if self.input.is_some() {
            return self.handle_input_key(key);
        }
        if self.drag.is_active() {
            return self.handle_drag_key(key);
        }
        self.handle_board_key(key)
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.move_column(false);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.move_column(true);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_row(false);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_row(true);
                None
            }
            KeyCode::Char(' ') => {
                self.start_drag();
                None
            }
            KeyCode::Char('n') => {
                match self.focused_column().map(|column| column.id().clone()) {
                    Some(section) => {
                        self.open_input(InputPurpose::NewTask { section }, String::new());
                    }
                    None => self.error("Create a section first"),
                }
                None
            }
            KeyCode::Char('N') => {
                self.open_input(InputPurpose::NewSection, String::new());
                None
            }
            KeyCode::Char('R') => {
                match self
                    .focused_column()
                    .map(|column| (column.id().clone(), column.title().to_owned()))
                {
                    Some((section, title)) => {
                        self.open_input(InputPurpose::RenameSection { section }, title);
                    }
                    None => self.error("No section selected"),
                }
                None
            }
            KeyCode::Char('D') => {
                let Some(column) = self.focused_column() else {
                    self.error("No section selected");
                    return None;
                };
                if !column.tasks.is_empty() {
                    let title = column.title().to_owned();
                    self.error(format!("Section '{title}' still has tasks"));
                    return None;
                }
                Some(UiAction::DeleteSection {
                    section: column.id().clone(),
                })
            }
            KeyCode::Char('x') => self.selected_task_id().map_or_else(
                || {
                    self.error("No task selected");
                    None
                },
                |task| Some(UiAction::ToggleTask { task }),
            ),
            KeyCode::Char('d') => self.selected_task_id().map_or_else(
                || {
                    self.error("No task selected");
                    None
                },
                |task| Some(UiAction::DeleteTask { task }),
            ),
            KeyCode::Char('r') => {
                self.info("Reloading board");
                Some(UiAction::Refresh)
            }
            _ => None,
        }
    }

    fn handle_drag_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Esc => {
                self.drag.cancel();
                self.clamp_cursor();
                self.info("Drag cancelled");
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.move_column(false);
                self.hover();
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.move_column(true);
                self.hover();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_row(false);
                self.hover();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_row(true);
                self.hover();
                None
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let target = self.hovered().map(|id| id.to_string());
                let commit = self.drag.end(target.as_deref());
                self.clamp_cursor();
                commit.map(UiAction::Drop)
            }
            _ => None,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        let input = self.input.as_mut()?;
        match key.code {
            KeyCode::Esc => {
                self.input = None;
                None
            }
            KeyCode::Backspace => {
                input.buffer.pop();
                None
            }
            KeyCode::Char(c) => {
                input.buffer.push(c);
                None
            }
            KeyCode::Enter => {
                if is_blank(&input.buffer) {
                    self.error("Title must not be blank");
                    return None;
                }
                let Input { purpose, buffer } = self.input.take()?;
                let title = buffer.trim().to_owned();
                Some(match purpose {
                    InputPurpose::NewTask { section } => UiAction::AddTask { section, title },
                    InputPurpose::NewSection => UiAction::AddSection { title },
                    InputPurpose::RenameSection { section } => {
                        UiAction::RenameSection { section, title }
                    }
                })
            }
            _ => None,
        }
    }

    fn open_input(&mut self, purpose: InputPurpose, buffer: String) {
        self.input = Some(Input { purpose, buffer });
    }

    fn move_column(&mut self, forward: bool) {
        let columns = self.board.columns().len();
        if columns == 0 {
            return;
        }
        self.column = if forward {
            (self.column + 1).min(columns - 1)
        } else {
            self.column.saturating_sub(1)
        };
        self.row = self.row.min(self.row_limit());
    }

    fn move_row(&mut self, forward: bool) {
        self.row = if forward {
            (self.row + 1).min(self.row_limit())
        } else {
            self.row.saturating_sub(1)
        };
    }

    fn start_drag(&mut self) {
        let Some(task) = self.selected_task() else {
            self.error("No task selected");
            return;
        };
        let raw = DragId::Task(task.id.clone()).to_string();
        if self.drag.start(&raw, &self.board) {
            self.info("Dragging: move with arrows, space to drop, esc to cancel");
        }
    }

    fn hover(&mut self) {
        let Some(active) = self.drag.state().active() else {
            return;
        };
        let active = DragId::Task(active.clone()).to_string();
        if let Some(target) = self.hovered() {
            self.drag.over(&active, &target.to_string());
        }
    }

    pub(super) fn info(&mut self, message: impl Into<String>) {
        self.message = Some(Message::info(message));
    }

    pub(super) fn error(&mut self, message: impl Into<String>) {
        self.message = Some(Message::error(message));
    }

    pub(super) fn tick(&mut self) {
        if let Some(msg) = &self.message
            && msg.is_expired(Duration::from_secs(UI_MESSAGE_TTL_SECS))
        {
            self.message = None;
        }
    }
}

pub(super) struct Message {
    pub(super) text: String,
    pub(super) level: MessageLevel,
    created_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MessageLevel {
    Info,
    Error,
}

impl Message {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: MessageLevel::Info,
            created_at: Instant::now(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: MessageLevel::Error,
            created_at: Instant::now(),
        }
    }

    pub(super) fn style(&self) -> Style {
        match self.level {
            MessageLevel::Info => Style::default().fg(Color::Green),
            MessageLevel::Error => Style::default().fg(Color::Red),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}
