use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use taskboard_core::{Column, DragId, Task};

use super::constants::{CURSOR_SYMBOL, DRAG_SYMBOL, FOOTER_HEIGHT, PENDING_SUFFIX};
use super::view::Ui;

const BOARD_MIN_HEIGHT: u16 = 5;

impl Ui {
    pub(super) fn draw(&self, f: &mut Frame<'_>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(BOARD_MIN_HEIGHT),
                Constraint::Length(FOOTER_HEIGHT),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(f.area());

        self.draw_board(f, rows[0]);
        self.draw_help(f, rows[1]);
        self.draw_status(f, rows[2]);
    }

    fn draw_board(&self, f: &mut Frame<'_>, area: Rect) {
        let columns = self.board.columns();
        if columns.is_empty() {
            let empty = Paragraph::new("No sections yet. Press N to create one.")
                .block(Block::default().title("Board").borders(Borders::ALL));
            f.render_widget(empty, area);
            return;
        }

        let count = u32::try_from(columns.len()).unwrap_or(u32::MAX);
        let constraints: Vec<Constraint> = columns
            .iter()
            .map(|_| Constraint::Ratio(1, count))
            .collect();
        let areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (index, (column, rect)) in columns.iter().zip(areas.iter()).enumerate() {
            self.draw_column(f, *rect, index, column);
        }
    }

    fn draw_column(&self, f: &mut Frame<'_>, area: Rect, index: usize, column: &Column) {
        let focused = index == self.column;
        let candidate = self.drag.state().candidate();
        let column_targeted = candidate == Some(&DragId::Column(column.id().clone()));

        let border = if column_targeted {
            Style::default().fg(Color::Yellow)
        } else if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let block = Block::default()
            .title(format!("{} ({})", column.title(), column.tasks.len()))
            .borders(Borders::ALL)
            .border_style(border);

        let mut lines: Vec<Line<'_>> = column
            .tasks
            .iter()
            .enumerate()
            .map(|(row, task)| self.task_line(task, focused && row == self.row))
            .collect();
        if self.drag.is_active() && focused && self.row == column.tasks.len() {
            lines.push(Line::from(Span::styled(
                format!("{CURSOR_SYMBOL}(end of column)"),
                Style::default().fg(Color::Yellow),
            )));
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn task_line<'a>(&self, task: &'a Task, under_cursor: bool) -> Line<'a> {
        let state = self.drag.state();
        let dragged = state.active() == Some(&task.id);
        let targeted = state.candidate() == Some(&DragId::Task(task.id.clone()));

        let marker = if dragged {
            DRAG_SYMBOL
        } else if under_cursor {
            CURSOR_SYMBOL
        } else {
            "  "
        };
        let check = if task.completed { "[x] " } else { "[ ] " };

        let mut style = Style::default();
        if task.completed {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        if dragged {
            style = style.fg(Color::DarkGray);
        } else if targeted {
            style = style.fg(Color::Yellow);
        } else if under_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }

        let mut spans = vec![
            Span::raw(marker),
            Span::raw(check),
            Span::styled(task.title.as_str(), style),
        ];
        if task.id.is_temporary() {
            spans.push(Span::styled(
                PENDING_SUFFIX,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        Line::from(spans)
    }

    fn draw_help(&self, f: &mut Frame<'_>, area: Rect) {
        let (title, text) = match &self.input {
            Some(input) => (input.prompt(), format!("{}_", input.buffer)),
            None => ("Keys", self.instructions().to_owned()),
        };
        let help = Paragraph::new(text)
            .block(Block::default().title(title).borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        f.render_widget(help, area);
    }

    fn draw_status(&self, f: &mut Frame<'_>, area: Rect) {
        let (text, style) = self.message.as_ref().map_or_else(
            || (self.summary(), Style::default()),
            |message| (message.text.clone(), message.style()),
        );
        let status = Paragraph::new(text)
            .block(Block::default().title("Status").borders(Borders::ALL))
            .style(style);
        f.render_widget(status, area);
    }

    pub(super) const fn instructions(&self) -> &'static str {
        if self.input.is_some() {
            "enter: save / esc: cancel"
        } else if self.drag.is_active() {
            "h/j/k/l: choose target / space,enter: drop / esc: cancel"
        } else {
            "h/j/k/l: move / space: drag / n: new task / x: done / d: delete / N: new section / R: rename section / D: delete section / r: reload / q: quit"
        }
    }

    pub(super) fn summary(&self) -> String {
        let pending = self
            .board
            .columns()
            .iter()
            .flat_map(|column| column.tasks.iter())
            .filter(|task| task.id.is_temporary())
            .count();
        let mut text = format!(
            "{} sections, {} tasks",
            self.board.columns().len(),
            self.board.task_count()
        );
        if pending > 0 {
            text.push_str(&format!(", {pending} saving"));
        }
        text
    }
}
