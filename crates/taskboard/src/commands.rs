use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use taskboard_app::{BoardBackend, BoardController, NoticeReceiver, Outcome, ProjectConfig};
use taskboard_core::{
    Board, FieldPatch, NewTask, Page, SectionId, SetDiff, SortDirection, Task, TaskFilter, TaskId,
    TaskPatch, TaskQuery, TaskSort,
};
use taskboard_store_file::FileStore;
use time::macros::format_description;
use tokio::sync::Mutex;

use crate::{Command, OutputFormat, SectionCommand};

/// Backend used by the binary: the JSON store behind an async lock.
pub type FileBackend = Arc<Mutex<FileStore>>;

/// Controller over the project's board document.
pub fn open_controller(
    workdir: &Path,
    config: &ProjectConfig,
) -> Result<(BoardController<FileBackend>, NoticeReceiver)> {
    let path = config.store_path(workdir);
    let store = FileStore::open(&path)
        .with_context(|| format!("failed to open board at {}", path.display()))?;
    Ok(BoardController::new(
        Arc::new(Mutex::new(store)),
        config.board.page_size(),
    ))
}

pub fn run(command: Command, workdir: &Path, config: &ProjectConfig) -> Result<()> {
    if matches!(command, Command::Init) {
        return handle_init(workdir, config);
    }
    let (controller, notices) = open_controller(workdir, config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(execute(command, &controller, notices))?;
    print!("{output}");
    Ok(())
}

fn handle_init(workdir: &Path, config: &ProjectConfig) -> Result<()> {
    let path = config.store_path(workdir);
    let store = FileStore::open(&path)?;
    let sections = store.seed_sections(config.board.sections())?;
    println!("Board ready at {}", path.display());
    for section in sections {
        println!("  {} {}", section.id, section.title);
    }
    Ok(())
}

/// Run one board command and return what should be printed.
#[allow(clippy::too_many_lines)]
async fn execute<B: BoardBackend>(
    command: Command,
    controller: &BoardController<B>,
    mut notices: NoticeReceiver,
) -> Result<String> {
    if !controller.refetch().await {
        return Err(failure(&mut notices, "failed to load board"));
    }
    let board = controller.snapshot();

    match command {
        Command::Show { format } => match format {
            OutputFormat::Table => Ok(render_board(&board)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&board_json(&board))? + "\n"),
        },
        Command::Ls {
            section,
            text,
            priorities,
            done,
            open,
            assignee,
            tags,
            sort,
            desc,
            page,
            page_size,
            format,
        } => {
            let section = section
                .map(|raw| resolve_section(&board, &raw))
                .transpose()?;
            let completed = match (done, open) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let filter = TaskFilter {
                text,
                section,
                priorities: priorities.into_iter().collect(),
                completed,
                assignee,
                tags: tags.into_iter().collect(),
            };
            let query = TaskQuery {
                page_no: page,
                page_size,
                filter: (!filter.is_empty()).then_some(filter),
                sort: sort.map(|key| TaskSort {
                    key: key.into(),
                    direction: if desc {
                        SortDirection::Descending
                    } else {
                        SortDirection::Ascending
                    },
                }),
            };
            let page = controller
                .backend()
                .get_tasks(&query)
                .await
                .map_err(Into::<anyhow::Error>::into)?;
            match format {
                OutputFormat::Table => Ok(render_page(&board, &page)),
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&page)? + "\n"),
            }
        }
        Command::Add {
            title,
            section,
            priority,
            tags,
            assignee,
            due,
        } => {
            let section = match section {
                Some(raw) => resolve_section(&board, &raw)?,
                None => board
                    .columns()
                    .first()
                    .map(|column| column.id().clone())
                    .ok_or_else(|| anyhow!("board has no columns; run `taskboard init`"))?,
            };
            let mut fields = NewTask::new(section, title);
            fields.priority = priority.unwrap_or_default();
            fields.tags = tags.into_iter().collect();
            fields.assignee = assignee;
            fields.due_date = due;
            let id = settle(
                controller.create_task(fields).await,
                &mut notices,
                "title must not be blank",
            )?;
            Ok(format!("Created task {id}\n"))
        }
        Command::Mv { task, to, before } => {
            let id = resolve_task(&board, &task)?;
            let target = resolve_section(&board, &to)?;
            let before = before.map(|raw| resolve_task(&board, &raw)).transpose()?;
            let source = board
                .section_of(&id)
                .cloned()
                .ok_or_else(|| anyhow!("task {id} is not on the board"))?;
            settle(
                controller
                    .move_task(&id, &source, &target, before.as_ref())
                    .await,
                &mut notices,
                "task is already in that column",
            )?;
            let title = board.column(&target).map_or("", |column| column.title());
            Ok(format!("Moved {id} to {title}\n"))
        }
        Command::Edit {
            task,
            title,
            priority,
            add_tags,
            remove_tags,
            assignee,
            clear_assignee,
            due,
            clear_due,
        } => {
            let id = resolve_task(&board, &task)?;
            let patch = TaskPatch {
                title,
                priority,
                tags: SetDiff {
                    added: add_tags.into_iter().collect(),
                    removed: remove_tags.into_iter().collect(),
                },
                assignee: field_patch(assignee, clear_assignee),
                due_date: field_patch(due, clear_due),
                ..TaskPatch::default()
            };
            settle(
                controller.update_task(&id, &patch).await,
                &mut notices,
                "nothing to change",
            )?;
            Ok(format!("Updated {id}\n"))
        }
        Command::Done { task, undo } => {
            let id = resolve_task(&board, &task)?;
            settle(
                controller
                    .update_task(&id, &TaskPatch::completed(!undo))
                    .await,
                &mut notices,
                "task not found",
            )?;
            Ok(format!("{} {id}\n", if undo { "Reopened" } else { "Completed" }))
        }
        Command::Rm { task } => {
            let id = resolve_task(&board, &task)?;
            settle(controller.delete_task(&id).await, &mut notices, "task not found")?;
            Ok(format!("Deleted {id}\n"))
        }
        Command::Section { cmd } => match cmd {
            SectionCommand::Add { title } => {
                let id = settle(
                    controller.create_section(&title).await,
                    &mut notices,
                    "title must not be blank",
                )?;
                Ok(format!("Created section {id}\n"))
            }
            SectionCommand::Rename { section, title } => {
                let id = resolve_section(&board, &section)?;
                settle(
                    controller.rename_section(&id, &title).await,
                    &mut notices,
                    "title must not be blank",
                )?;
                Ok(format!("Renamed {id} to {title}\n"))
            }
            SectionCommand::Rm { section } => {
                let id = resolve_section(&board, &section)?;
                settle(
                    controller.delete_section(&id).await,
                    &mut notices,
                    "section not found",
                )?;
                Ok(format!("Deleted section {id}\n"))
            }
        },
        Command::Init | Command::Tui => bail!("not a board command"),
    }
}

fn field_patch<T>(value: Option<T>, clear: bool) -> Option<FieldPatch<T>> {
    if clear {
        Some(FieldPatch::Clear)
    } else {
        value.map(FieldPatch::Set)
    }
}

fn failure(notices: &mut NoticeReceiver, fallback: &str) -> anyhow::Error {
    notices
        .try_recv()
        .map_or_else(|_| anyhow!("{fallback}"), |notice| anyhow!("{notice}"))
}

fn settle<T>(outcome: Outcome<T>, notices: &mut NoticeReceiver, ignored: &str) -> Result<T> {
    match outcome {
        Outcome::Confirmed(value) => Ok(value),
        Outcome::Ignored => bail!("nothing changed: {ignored}"),
        Outcome::RolledBack => Err(failure(notices, "operation failed, please try again")),
    }
}

/// Find a column by id, or by case-insensitive title.
pub fn resolve_section(board: &Board, raw: &str) -> Result<SectionId> {
    let raw = raw.trim();
    if let Some(column) = board.column(&SectionId::new(raw)) {
        return Ok(column.id().clone());
    }
    let mut matches = board
        .columns()
        .iter()
        .filter(|column| column.title().eq_ignore_ascii_case(raw));
    match (matches.next(), matches.next()) {
        (Some(column), None) => Ok(column.id().clone()),
        (Some(_), Some(_)) => bail!("section title '{raw}' is ambiguous; use its id"),
        (None, _) => bail!("no section matches '{raw}'"),
    }
}

/// Find a task by id or unique id prefix.
pub fn resolve_task(board: &Board, raw: &str) -> Result<TaskId> {
    let raw = raw.trim();
    let exact = TaskId::new(raw);
    if board.task(&exact).is_some() {
        return Ok(exact);
    }
    let mut matches = board
        .columns()
        .iter()
        .flat_map(|column| column.tasks.iter())
        .filter(|task| !raw.is_empty() && task.id.as_str().starts_with(raw));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (Some(_), Some(_)) => bail!("task prefix '{raw}' is ambiguous"),
        (None, _) => bail!("no task matches '{raw}'"),
    }
}

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "[{}] {}  ({}, {}",
        if task.completed { "x" } else { " " },
        task.title,
        task.id,
        task.priority
    );
    if let Some(due) = task.due_date {
        let format = format_description!("[year]-[month]-[day]");
        if let Ok(due) = due.format(format) {
            let _ = write!(line, ", due {due}");
        }
    }
    if let Some(assignee) = &task.assignee {
        let _ = write!(line, ", @{assignee}");
    }
    for tag in &task.tags {
        let _ = write!(line, ", #{tag}");
    }
    line.push(')');
    line
}

/// Plain-text rendering of the whole board.
pub fn render_board(board: &Board) -> String {
    if board.columns().is_empty() {
        return "Board has no columns; run `taskboard init`.\n".to_owned();
    }
    let mut out = String::new();
    for column in board.columns() {
        let _ = writeln!(
            out,
            "== {} ({}) [{}]",
            column.title(),
            column.tasks.len(),
            column.id()
        );
        for task in &column.tasks {
            let _ = writeln!(out, "  {}", task_line(task));
        }
    }
    out
}

fn render_page(board: &Board, page: &Page<Task>) -> String {
    let mut out = String::new();
    for task in &page.items {
        let section = board.column(&task.section).map_or("?", |column| column.title());
        let _ = writeln!(out, "{section:<14} {}", task_line(task));
    }
    let _ = writeln!(
        out,
        "-- page {} ({} of {} tasks){}",
        page.page_no,
        page.items.len(),
        page.total_count,
        if page.has_next_page { ", more with --page" } else { "" }
    );
    out
}

#[derive(Serialize)]
struct ColumnJson<'a> {
    id: &'a SectionId,
    title: &'a str,
    tasks: &'a [Task],
}

fn board_json(board: &Board) -> Vec<ColumnJson<'_>> {
    board
        .columns()
        .iter()
        .map(|column| ColumnJson {
            id: column.id(),
            title: column.title(),
            tasks: &column.tasks,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_app::MemoryBackend;
    use taskboard_core::{Priority, Section};

    fn expect_ok<T, E: std::fmt::Display>(result: std::result::Result<T, E>, ctx: &str) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("{ctx}: {err}"),
        }
    }

    fn sample_records() -> (Vec<Section>, Vec<Task>) {
        let todo = SectionId::new("todo");
        let done = SectionId::new("done");
        let mut report = NewTask::new(todo.clone(), "Write report");
        report.priority = Priority::High;
        report.assignee = Some("alice".into());
        report.tags.insert("docs".into());
        let tasks = vec![
            Task::from_new(TaskId::new("0192aa"), report),
            Task::from_new(TaskId::new("0192bb"), NewTask::new(todo.clone(), "Review")),
            Task::from_new(TaskId::new("0193cc"), NewTask::new(done.clone(), "Ship")),
        ];
        (
            vec![Section::new(todo, "To Do"), Section::new(done, "Done")],
            tasks,
        )
    }

    fn sample_board() -> Board {
        let (sections, tasks) = sample_records();
        Board::from_records(sections, tasks).0
    }

    #[test]
    fn resolves_sections_by_id_or_title() {
        let board = sample_board();
        assert_eq!(expect_ok(resolve_section(&board, "done"), "id"), SectionId::new("done"));
        assert_eq!(expect_ok(resolve_section(&board, "to do"), "title"), SectionId::new("todo"));
        assert!(resolve_section(&board, "Later").is_err());
    }

    #[test]
    fn resolves_tasks_by_unique_prefix() {
        let board = sample_board();
        assert_eq!(expect_ok(resolve_task(&board, "0193"), "prefix"), TaskId::new("0193cc"));
        assert_eq!(expect_ok(resolve_task(&board, "0192bb"), "exact"), TaskId::new("0192bb"));
        let Err(err) = resolve_task(&board, "0192") else {
            panic!("ambiguous prefix should error");
        };
        assert!(err.to_string().contains("ambiguous"));
        assert!(resolve_task(&board, "").is_err());
    }

    #[test]
    fn renders_board_with_task_details() {
        let text = render_board(&sample_board());
        assert!(text.contains("== To Do (2) [todo]"));
        assert!(text.contains("[ ] Write report  (0192aa, high, @alice, #docs)"));
        assert!(text.contains("== Done (1) [done]"));
        assert_eq!(
            render_board(&Board::default()),
            "Board has no columns; run `taskboard init`.\n"
        );
    }

    #[tokio::test]
    async fn move_and_list_through_controller() {
        let (sections, tasks) = sample_records();
        let (controller, notices) =
            BoardController::new(MemoryBackend::from_records(sections, tasks), 10);
        let out = expect_ok(
            execute(
                Command::Mv {
                    task: "0192b".into(),
                    to: "Done".into(),
                    before: None,
                },
                &controller,
                notices,
            )
            .await,
            "mv",
        );
        assert_eq!(out, "Moved 0192bb to Done\n");

        let (_, notices) = tokio::sync::mpsc::unbounded_channel();
        let out = expect_ok(
            execute(
                Command::Ls {
                    section: Some("done".into()),
                    text: None,
                    priorities: Vec::new(),
                    done: false,
                    open: true,
                    assignee: None,
                    tags: Vec::new(),
                    sort: None,
                    desc: false,
                    page: 1,
                    page_size: 1,
                    format: OutputFormat::Table,
                },
                &controller,
                notices,
            )
            .await,
            "ls",
        );
        assert!(out.contains("Ship"));
        assert!(out.contains("-- page 1 (1 of 2 tasks), more with --page"));
    }

    #[tokio::test]
    async fn blank_title_is_reported() {
        let (sections, tasks) = sample_records();
        let (controller, notices) =
            BoardController::new(MemoryBackend::from_records(sections, tasks), 10);
        let Err(err) = execute(
            Command::Add {
                title: "  ".into(),
                section: None,
                priority: None,
                tags: Vec::new(),
                assignee: None,
                due: None,
            },
            &controller,
            notices,
        )
        .await
        else {
            panic!("blank title should fail");
        };
        assert!(err.to_string().contains("title must not be blank"));
    }

    #[tokio::test]
    async fn refused_section_delete_surfaces_notice() {
        let (sections, tasks) = sample_records();
        let (controller, notices) =
            BoardController::new(MemoryBackend::from_records(sections, tasks), 10);
        let Err(err) = execute(
            Command::Section {
                cmd: SectionCommand::Rm {
                    section: "To Do".into(),
                },
            },
            &controller,
            notices,
        )
        .await
        else {
            panic!("non-empty section should not be deleted");
        };
        assert_eq!(err.to_string(), "Error deleting section, please try again");
    }
}
