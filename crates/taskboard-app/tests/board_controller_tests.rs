#![allow(missing_docs)]

mod support;

use support::{Call, ScriptedBackend, done, ids, loaded, todo, two_columns, wait_for};
use taskboard_app::{BoardController, MemoryBackend, OperationKind, Outcome};
use taskboard_core::{DragSession, NewTask, Section, SectionId, Task, TaskId, TaskPatch};

fn t(id: &str) -> TaskId {
    TaskId::new(id)
}

#[tokio::test]
async fn optimistic_move_is_visible_before_backend_answers() {
    let (controller, _notices) = loaded(ScriptedBackend::gated(two_columns())).await;

    let worker = controller.clone();
    let handle =
        tokio::spawn(async move { worker.move_task(&t("t1"), &todo(), &done(), None).await });
    wait_for(|| controller.backend().count(Call::UpdateTask) == 1).await;

    let board = controller.snapshot();
    assert_eq!(ids(&controller, &todo()), vec!["t2"]);
    assert_eq!(ids(&controller, &done()), vec!["t3", "t1"]);
    assert_eq!(board.section_of(&t("t1")), Some(&done()));
    assert_eq!(board.section_title_of(&t("t1")), Some("Done"));
    board.check_invariants().unwrap_or_else(|err| panic!("invariants: {err}"));

    controller.backend().release(1);
    let outcome = handle.await.unwrap_or_else(|err| panic!("join: {err}"));
    assert_eq!(outcome, Outcome::Confirmed(()));
    assert_eq!(ids(&controller, &done()), vec!["t3", "t1"]);

    let (_, tasks) = controller.backend().inner.records().await;
    let moved = tasks.iter().find(|task| task.id == t("t1"));
    assert_eq!(moved.map(|task| &task.section), Some(&done()));
}

#[tokio::test]
async fn move_inserts_before_anchor() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let outcome = controller
        .move_task(&t("t1"), &todo(), &done(), Some(&t("t3")))
        .await;
    assert!(outcome.is_confirmed());
    assert_eq!(controller.backend().count(Call::UpdateTask), 1);
    // Storage order wins once the board is reconciled.
    assert_eq!(ids(&controller, &done()), vec!["t3", "t1"]);
}

#[tokio::test]
async fn blank_titles_issue_no_requests() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let before = controller.snapshot();

    assert_eq!(controller.add_task(&SectionId::new("col-1"), "").await, Outcome::Ignored);
    assert_eq!(controller.add_task(&todo(), "   ").await, Outcome::Ignored);
    assert_eq!(controller.create_section("").await, Outcome::Ignored);
    assert_eq!(controller.create_section(" \t").await, Outcome::Ignored);
    assert_eq!(controller.rename_section(&todo(), "  ").await, Outcome::Ignored);
    let blank = TaskPatch {
        title: Some(String::new()),
        ..TaskPatch::default()
    };
    assert_eq!(controller.update_task(&t("t1"), &blank).await, Outcome::Ignored);

    assert_eq!(controller.snapshot(), before);
    assert_eq!(controller.backend().mutation_count(), 0);
}

#[tokio::test]
async fn move_within_one_column_changes_nothing() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let before = controller.snapshot();
    let outcome = controller.move_task(&t("t1"), &todo(), &todo(), None).await;
    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(controller.snapshot(), before);
    assert!(controller.backend().calls().is_empty());
}

#[tokio::test]
async fn move_of_absent_task_is_abandoned_silently() {
    let backend = MemoryBackend::from_records(
        vec![
            Section::new(SectionId::new("colA"), "A"),
            Section::new(SectionId::new("colB"), "B"),
        ],
        Vec::new(),
    );
    let (controller, mut notices) = loaded(ScriptedBackend::new(backend)).await;
    let before = controller.snapshot();

    let outcome = controller
        .move_task(&t("t9"), &SectionId::new("colA"), &SectionId::new("colB"), None)
        .await;

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(controller.snapshot(), before);
    assert!(controller.backend().calls().is_empty());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn added_task_keeps_position_and_fields_under_server_id() {
    let col = SectionId::new("col-1");
    let backend = MemoryBackend::from_records(
        vec![Section::new(col.clone(), "Inbox")],
        vec![Task::from_new(t("t1"), NewTask::new(col.clone(), "Existing"))],
    )
    .with_next_id(42);
    let (controller, _notices) = loaded(ScriptedBackend::gated(backend)).await;

    let staged = controller
        .stage_task(NewTask::new(col.clone(), "Write report"))
        .unwrap_or_else(|| panic!("task should be staged"));
    let temporary = staged.id().clone();
    assert!(temporary.is_temporary());
    assert_eq!(ids(&controller, &col), vec!["t1".to_owned(), temporary.to_string()]);
    let optimistic = controller
        .snapshot()
        .task(&temporary)
        .cloned()
        .unwrap_or_else(|| panic!("staged task missing"));

    controller.backend().release(1);
    let outcome = controller.confirm_task(staged).await;
    assert_eq!(outcome, Outcome::Confirmed(t("srv-42")));

    let board = controller.snapshot();
    assert!(board.task(&temporary).is_none());
    assert_eq!(ids(&controller, &col), vec!["t1", "srv-42"]);
    let confirmed = board
        .task(&t("srv-42"))
        .unwrap_or_else(|| panic!("confirmed task missing"));
    assert_eq!(
        Task {
            id: temporary,
            ..confirmed.clone()
        },
        optimistic
    );
}

#[tokio::test]
async fn failed_move_restores_last_confirmed_board() {
    let (controller, mut notices) = loaded(ScriptedBackend::new(two_columns())).await;
    controller.backend().fail(Call::UpdateTask);
    let before = controller.snapshot();

    let outcome = controller.move_task(&t("t2"), &todo(), &done(), None).await;

    assert_eq!(outcome, Outcome::RolledBack);
    assert_eq!(controller.snapshot(), before);
    let notice = notices.try_recv().unwrap_or_else(|err| panic!("notice: {err}"));
    assert_eq!(notice.operation, OperationKind::MoveTask);
    assert_eq!(notice.message, "Error moving task, please try again");
    // Rolled back, then reconciled against the backend.
    assert!(controller.backend().count(Call::GetTasks) >= 1);
}

#[tokio::test]
async fn unacknowledged_update_counts_as_failure() {
    let (controller, mut notices) = loaded(ScriptedBackend::new(two_columns())).await;
    controller.backend().refuse_ack(Call::UpdateTask);

    let outcome = controller.toggle_complete(&t("t1")).await;

    assert_eq!(outcome, Outcome::RolledBack);
    let board = controller.snapshot();
    assert!(!board.task(&t("t1")).is_some_and(|task| task.completed));
    let notice = notices.try_recv().unwrap_or_else(|err| panic!("notice: {err}"));
    assert_eq!(notice.operation, OperationKind::UpdateTask);
}

#[tokio::test]
async fn failed_create_removes_optimistic_task() {
    let (controller, mut notices) = loaded(ScriptedBackend::new(two_columns())).await;
    controller.backend().fail(Call::CreateTask);

    let outcome = controller.add_task(&todo(), "Call caterer").await;

    assert_eq!(outcome, Outcome::RolledBack);
    assert_eq!(ids(&controller, &todo()), vec!["t1", "t2"]);
    let notice = notices.try_recv().unwrap_or_else(|err| panic!("notice: {err}"));
    assert_eq!(notice.message, "Error creating task, please try again");
}

#[tokio::test]
async fn drag_from_todo_to_done_moves_the_task() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let mut session = DragSession::new();

    assert!(session.start("task-t1", &controller.snapshot()));
    assert!(session.over("task-t1", "column-done"));
    let commit = session
        .end(Some("column-done"))
        .unwrap_or_else(|| panic!("drop should commit"));
    assert!(!session.is_active());

    let outcome = controller.handle_drop(&commit).await;
    assert_eq!(outcome, Outcome::Confirmed(()));
    let board = controller.snapshot();
    assert_eq!(board.section_title_of(&t("t1")), Some("Done"));
    assert!(!ids(&controller, &todo()).contains(&"t1".to_owned()));
}

#[tokio::test]
async fn drop_on_task_in_same_column_reorders_locally() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let mut session = DragSession::new();
    assert!(session.start("task-t2", &controller.snapshot()));
    let commit = session
        .end(Some("task-t1"))
        .unwrap_or_else(|| panic!("drop should commit"));

    assert_eq!(controller.handle_drop(&commit).await, Outcome::Confirmed(()));
    assert_eq!(ids(&controller, &todo()), vec!["t2", "t1"]);
    assert!(controller.backend().calls().is_empty());
}

#[tokio::test]
async fn column_lifecycle_round_trip() {
    let backend = two_columns().with_next_id(7);
    let (controller, mut notices) = loaded(ScriptedBackend::new(backend)).await;

    let created = controller.create_section("Review").await;
    assert_eq!(created, Outcome::Confirmed(SectionId::new("srv-7")));
    let review = SectionId::new("srv-7");
    assert_eq!(
        controller.snapshot().columns().last().map(|c| c.title().to_owned()),
        Some("Review".to_owned())
    );

    assert!(controller.rename_section(&review, "QA").await.is_confirmed());
    assert_eq!(
        controller.snapshot().column(&review).map(|c| c.title().to_owned()),
        Some("QA".to_owned())
    );

    assert!(controller.delete_section(&review).await.is_confirmed());
    assert!(controller.snapshot().column(&review).is_none());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn deleting_non_empty_column_is_rolled_back() {
    let (controller, mut notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let before = controller.snapshot();

    let outcome = controller.delete_section(&todo()).await;

    assert_eq!(outcome, Outcome::RolledBack);
    assert_eq!(controller.snapshot(), before);
    let notice = notices.try_recv().unwrap_or_else(|err| panic!("notice: {err}"));
    assert_eq!(notice.message, "Error deleting section, please try again");
}

#[tokio::test]
async fn failed_rename_reverts_title() {
    let (controller, mut notices) = loaded(ScriptedBackend::new(two_columns())).await;
    controller.backend().fail(Call::UpdateSection);

    assert_eq!(
        controller.rename_section(&todo(), "Backlog").await,
        Outcome::RolledBack
    );
    assert_eq!(
        controller.snapshot().column(&todo()).map(|c| c.title().to_owned()),
        Some("To Do".to_owned())
    );
    assert!(notices.try_recv().is_ok());
}

#[tokio::test]
async fn failed_delete_restores_task_position() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    controller.backend().fail(Call::DeleteTask);

    assert_eq!(controller.delete_task(&t("t1")).await, Outcome::RolledBack);
    assert_eq!(ids(&controller, &todo()), vec!["t1", "t2"]);

    controller.backend().heal(Call::DeleteTask);
    assert!(controller.delete_task(&t("t1")).await.is_confirmed());
    assert_eq!(ids(&controller, &todo()), vec!["t2"]);
}

#[tokio::test]
async fn same_task_mutations_run_one_at_a_time() {
    let (controller, _notices) = loaded(ScriptedBackend::gated(two_columns())).await;

    let first = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.toggle_complete(&t("t1")).await })
    };
    wait_for(|| controller.backend().count(Call::UpdateTask) == 1).await;
    let second = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.toggle_complete(&t("t1")).await })
    };
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(controller.backend().count(Call::UpdateTask), 1);

    controller.backend().release(2);
    let first = first.await.unwrap_or_else(|err| panic!("join: {err}"));
    let second = second.await.unwrap_or_else(|err| panic!("join: {err}"));
    assert_eq!(first, Outcome::Confirmed(true));
    assert_eq!(second, Outcome::Confirmed(false));
    assert_eq!(controller.backend().count(Call::UpdateTask), 2);
}

#[tokio::test]
async fn refetch_waits_until_nothing_is_in_flight() {
    let (controller, _notices) = loaded(ScriptedBackend::gated(two_columns())).await;

    let moving = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.move_task(&t("t1"), &todo(), &done(), None).await })
    };
    let toggling = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.toggle_complete(&t("t3")).await })
    };
    wait_for(|| controller.backend().count(Call::UpdateTask) == 2).await;
    assert_eq!(controller.in_flight(), 2);

    controller.backend().release(1);
    wait_for(|| controller.in_flight() == 1).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(controller.backend().count(Call::GetTasks), 0);
    // The other mutation's optimistic state is untouched.
    assert_eq!(controller.snapshot().column(&done()).map(|c| c.tasks.len()), Some(2));

    controller.backend().release(1);
    assert!(moving.await.unwrap_or_else(|err| panic!("join: {err}")).is_confirmed());
    assert!(toggling.await.unwrap_or_else(|err| panic!("join: {err}")).is_confirmed());
    assert!(controller.backend().count(Call::GetTasks) >= 1);
    assert_eq!(controller.in_flight(), 0);
}

#[tokio::test]
async fn mutation_of_staged_task_follows_issued_id() {
    let backend = two_columns().with_next_id(100);
    let (controller, _notices) = loaded(ScriptedBackend::gated(backend)).await;

    let staged = controller
        .stage_task(NewTask::new(todo(), "Order food"))
        .unwrap_or_else(|| panic!("task should be staged"));
    let temporary = staged.id().clone();

    let confirming = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.confirm_task(staged).await })
    };
    let toggling = {
        let worker = controller.clone();
        let id = temporary.clone();
        tokio::spawn(async move { worker.toggle_complete(&id).await })
    };
    controller.backend().release(2);

    let confirmed = confirming.await.unwrap_or_else(|err| panic!("join: {err}"));
    assert_eq!(confirmed, Outcome::Confirmed(t("srv-100")));
    let toggled = toggling.await.unwrap_or_else(|err| panic!("join: {err}"));
    assert_eq!(toggled, Outcome::Confirmed(true));

    let (_, tasks) = controller.backend().inner.records().await;
    let stored = tasks.iter().find(|task| task.id == t("srv-100"));
    assert!(stored.is_some_and(|task| task.completed));
}

#[tokio::test]
async fn field_edits_are_applied_and_persisted() {
    let (controller, _notices) = loaded(ScriptedBackend::new(two_columns())).await;
    let patch = TaskPatch {
        title: Some("Draft final agenda".into()),
        section: Some(done()),
        ..TaskPatch::default()
    };

    assert!(controller.update_task(&t("t1"), &patch).await.is_confirmed());
    let board = controller.snapshot();
    let task = board.task(&t("t1")).unwrap_or_else(|| panic!("task"));
    assert_eq!(task.title, "Draft final agenda");
    assert_eq!(board.section_title_of(&t("t1")), Some("Done"));
    assert_eq!(
        controller.update_task(&t("t1"), &TaskPatch::default()).await,
        Outcome::Ignored
    );
}

#[tokio::test]
async fn failed_refetch_raises_load_notice() {
    let backend = ScriptedBackend::new(two_columns());
    backend.fail(Call::ListSections);
    let (controller, mut notices) = BoardController::new(backend, 50);

    assert!(!controller.refetch().await);
    let notice = notices.try_recv().unwrap_or_else(|err| panic!("notice: {err}"));
    assert_eq!(notice.operation, OperationKind::Load);
    assert!(controller.snapshot().columns().is_empty());
}

#[tokio::test]
async fn work_aimed_at_an_unconfirmed_column_waits_for_its_id() {
    let (controller, mut notices) = loaded(ScriptedBackend::gated(two_columns())).await;

    let create = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.create_section("Review").await })
    };
    wait_for(|| controller.backend().count(Call::CreateSection) == 1).await;
    let temporary = controller
        .snapshot()
        .columns()
        .last()
        .map(|column| column.id().clone())
        .unwrap_or_else(|| panic!("optimistic column missing"));
    assert!(temporary.is_temporary());

    let staged = controller
        .stage_task(NewTask::new(temporary.clone(), "Write notes"))
        .unwrap_or_else(|| panic!("task should be staged"));
    let add = {
        let worker = controller.clone();
        tokio::spawn(async move { worker.confirm_task(staged).await })
    };
    let moved = {
        let worker = controller.clone();
        let target = temporary.clone();
        tokio::spawn(async move { worker.move_task(&t("t1"), &todo(), &target, None).await })
    };
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(controller.backend().count(Call::CreateTask), 0);
    assert_eq!(controller.backend().count(Call::UpdateTask), 0);
    assert_eq!(ids(&controller, &temporary).len(), 2);

    controller.backend().release(3);
    let section = create.await.unwrap_or_else(|err| panic!("join: {err}"));
    let added = add.await.unwrap_or_else(|err| panic!("join: {err}"));
    let moved = moved.await.unwrap_or_else(|err| panic!("join: {err}"));

    let issued = section
        .confirmed()
        .unwrap_or_else(|| panic!("section should be confirmed"));
    let task = added
        .confirmed()
        .unwrap_or_else(|| panic!("task should be confirmed"));
    assert_eq!(moved, Outcome::Confirmed(()));
    assert!(notices.try_recv().is_err());

    let mut column = ids(&controller, &issued);
    column.sort();
    let mut expected = vec!["t1".to_owned(), task.to_string()];
    expected.sort();
    assert_eq!(column, expected);

    let (_, tasks) = controller.backend().inner.records().await;
    for id in [t("t1"), task] {
        let stored = tasks.iter().find(|stored| stored.id == id);
        assert_eq!(stored.map(|stored| &stored.section), Some(&issued));
    }
}
