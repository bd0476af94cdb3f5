//! Integration tests for scheduled tasks: delete-and-recreate, the disabling
//! fixup, bulk operations and waiting for a task server.

use mgmtsync_engine::{
    DeleteOutcome, ReconcileError, ResourceKind, ResourceManager, SaveAction, Sleeper,
    WaitOutcome, REQUESTS_PATH,
};
use mgmtsync_testkit::prelude::*;
use mgmtsync_transport::HttpMethod;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.naps.lock().push(duration);
    }
}

fn tasks(client: &mgmtsync_transport::ManageClient) -> ResourceManager<'_> {
    ResourceManager::new(client, ResourceKind::Task)
}

#[test]
fn reapplying_task_recreates_it() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let manager = tasks(&client);
    let task = TaskFixture::new("/a.xqy").database("Documents");

    let first = manager.create_or_update(&task.payload()).unwrap();
    assert_eq!(first.action(), SaveAction::Created);
    let first_id = first.resource_id().unwrap().to_string();

    let second = manager.create_or_update(&task.payload()).unwrap();
    assert_eq!(second.action(), SaveAction::Recreated);
    assert_ne!(second.resource_id(), Some(first_id.as_str()));

    assert_eq!(server.resources(TASKS).len(), 1);
    let deletes: Vec<_> = server
        .mutations()
        .into_iter()
        .filter(|c| c.method == HttpMethod::Delete)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(
        deletes[0].path,
        format!("/manage/v2/tasks/{first_id}?group-id=Default")
    );

    let stats = manager.stats();
    assert_eq!((stats.creates, stats.recreates, stats.deletes), (1, 1, 1));
}

#[test]
fn recreate_carries_changed_fields() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let seeded = TaskFixture::new("/a.xqy").root("/modules/");
    let old_id = server.seed(TASKS, None, seeded.properties());

    let changed = seeded.with("task-period", json!(5));
    let receipt = tasks(&client)
        .create_or_update(&changed.clone().id(&old_id).payload())
        .unwrap();
    assert_eq!(receipt.action(), SaveAction::Recreated);
    assert_eq!(receipt.payload().field("task-id").unwrap(), None);

    let mutations = server.mutations();
    let methods: Vec<_> = mutations.iter().map(|c| c.method).collect();
    assert_eq!(methods, [HttpMethod::Delete, HttpMethod::Post]);
    assert_eq!(
        mutations[0].path,
        format!("/manage/v2/tasks/{old_id}?group-id=Default")
    );
    assert_eq!(mutations[1].json_body(), changed.properties());

    let new_id = receipt.resource_id().unwrap();
    assert!(server.resource(TASKS, &old_id).is_none());
    let stored = server.resource(TASKS, new_id).unwrap();
    assert_eq!(stored["task-period"], json!(5));
}

#[test]
fn disabled_task_gets_fixup_call() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let manager = tasks(&client);

    let receipt = manager
        .create_or_update(&TaskFixture::new("/a.xqy").enabled(false).payload())
        .unwrap();
    let id = receipt.resource_id().unwrap().to_string();

    let mutations = server.mutations();
    assert_eq!(mutations.len(), 2);
    assert_eq!(mutations[1].method, HttpMethod::Put);
    assert_eq!(
        mutations[1].path,
        format!("/manage/v2/tasks/{id}/properties?group-id=Default")
    );
    assert_eq!(
        mutations[1].json_body(),
        json!({"task-id": id, "task-enabled": false})
    );

    let stored = server.resource(TASKS, &id).unwrap();
    assert_eq!(stored["task-enabled"], Value::Bool(false));
    assert_eq!(manager.stats().fixups, 1);
}

#[test]
fn enabled_task_needs_no_fixup() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());

    tasks(&client)
        .create_or_update(&TaskFixture::new("/a.xqy").enabled(true).payload())
        .unwrap();
    tasks(&client)
        .create_or_update(&TaskFixture::new("/b.xqy").payload())
        .unwrap();

    assert_eq!(server.mutations().len(), 2);
    assert!(server
        .mutations()
        .iter()
        .all(|c| c.method == HttpMethod::Post));
}

#[test]
fn fixup_without_location_header_fails() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.omit_location_headers();

    let err = tasks(&client)
        .create_or_update(&TaskFixture::new("/a.xqy").enabled(false).payload())
        .unwrap_err();
    assert!(matches!(err, ReconcileError::MissingLocationHeader { .. }));

    let receipt = tasks(&client)
        .create_or_update(&TaskFixture::new("/b.xqy").payload())
        .unwrap();
    assert_eq!(receipt.resource_id(), None);
    assert!(!receipt.has_location_header());
}

#[test]
fn task_root_breaks_ties() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let one = server.seed(TASKS, None, TaskFixture::new("/b.xqy").root("/one/").properties());
    let two = server.seed(TASKS, None, TaskFixture::new("/b.xqy").root("/two/").properties());

    let receipt = tasks(&client)
        .create_or_update(&TaskFixture::new("/b.xqy").root("/two/").payload())
        .unwrap();
    assert_eq!(receipt.action(), SaveAction::Recreated);

    let delete = server
        .mutations()
        .into_iter()
        .find(|c| c.method == HttpMethod::Delete)
        .unwrap();
    assert!(delete.path.contains(&format!("/tasks/{two}?")));
    assert!(server.resource(TASKS, &one).is_some());
    assert!(server.resource(TASKS, &two).is_none());
}

#[test]
fn unbroken_tie_is_ambiguous() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let one = server.seed(TASKS, None, TaskFixture::new("/b.xqy").properties());
    let two = server.seed(TASKS, None, TaskFixture::new("/b.xqy").properties());

    match tasks(&client).create_or_update(&TaskFixture::new("/b.xqy").payload()) {
        Err(ReconcileError::AmbiguousResourceMatch { kind, candidates, .. }) => {
            assert_eq!(kind, "task");
            assert_eq!(candidates, [one, two]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(server.mutations().is_empty());
}

#[test]
fn unmatched_root_creates_new_task() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.seed(TASKS, None, TaskFixture::new("/b.xqy").root("/one/").properties());
    server.seed(TASKS, None, TaskFixture::new("/b.xqy").root("/two/").properties());

    let receipt = tasks(&client)
        .create_or_update(&TaskFixture::new("/b.xqy").root("/three/").payload())
        .unwrap();
    assert_eq!(receipt.action(), SaveAction::Created);
    assert_eq!(server.resources(TASKS).len(), 3);
}

#[test]
fn tasks_are_scoped_to_group() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.seed(TASKS, Some("Default"), TaskFixture::new("/a.xqy").properties());

    let evaluator = tasks(&client).with_group("Evaluator");
    let receipt = evaluator
        .create_or_update(&TaskFixture::new("/a.xqy").payload())
        .unwrap();
    assert_eq!(receipt.action(), SaveAction::Created);
    assert_eq!(receipt.path(), "/manage/v2/tasks?group-id=Evaluator");
    assert_eq!(evaluator.list_identities().unwrap().len(), 1);
    assert_eq!(tasks(&client).list_identities().unwrap().len(), 1);
}

#[test]
fn delete_by_path_alias() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let id = server.seed(TASKS, None, TaskFixture::new("/a.xqy").properties());
    server.seed(TASKS, None, TaskFixture::new("/b.xqy").properties());
    server.seed(TASKS, None, TaskFixture::new("/b.xqy").properties());
    let manager = tasks(&client);

    assert_eq!(manager.delete("/a.xqy").unwrap(), DeleteOutcome::Deleted(id));
    assert_eq!(manager.delete("/missing.xqy").unwrap(), DeleteOutcome::NotFound);
    assert!(matches!(
        manager.delete("/b.xqy"),
        Err(ReconcileError::AmbiguousResourceMatch { .. })
    ));
    assert_eq!(server.resources(TASKS).len(), 2);
}

#[test]
fn bulk_toggles_update_every_task() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let ids: Vec<_> = ["/a.xqy", "/b.xqy"]
        .iter()
        .map(|p| server.seed(TASKS, None, TaskFixture::new(p).enabled(true).properties()))
        .collect();
    let manager = tasks(&client);

    manager.disable_all().unwrap();
    for id in &ids {
        assert_eq!(server.resource(TASKS, id).unwrap()["task-enabled"], Value::Bool(false));
    }

    manager.enable_all().unwrap();
    for id in &ids {
        assert_eq!(server.resource(TASKS, id).unwrap()["task-enabled"], Value::Bool(true));
    }
}

#[test]
fn bulk_operations_stop_at_first_failure() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    let ids: Vec<_> = ["/a.xqy", "/b.xqy", "/c.xqy"]
        .iter()
        .map(|p| server.seed(TASKS, None, TaskFixture::new(p).properties()))
        .collect();
    server.fail_on(HttpMethod::Put, &format!("/tasks/{}/", ids[1]), 500);

    let err = tasks(&client).disable_all().unwrap_err();
    assert_eq!(err.status_code(), Some(500));

    let puts: Vec<_> = server
        .mutations()
        .into_iter()
        .filter(|c| c.method == HttpMethod::Put)
        .collect();
    assert_eq!(puts.len(), 2);
    assert!(puts[0].path.contains(&ids[0]));
    assert!(puts[1].path.contains(&ids[1]));
}

#[test]
fn delete_all_removes_every_task() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    for path in ["/a.xqy", "/b.xqy", "/c.xqy"] {
        server.seed(TASKS, None, TaskFixture::new(path).properties());
    }

    let manager = tasks(&client);
    manager.delete_all().unwrap();
    assert!(server.resources(TASKS).is_empty());
    assert_eq!(manager.stats().deletes, 3);
}

#[test]
fn wait_polls_until_idle() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.add_task_server("7001", "Default");
    server.script_request_counts([3, 2, 1, 0]);
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcome = tasks(&client)
        .with_sleeper(sleeper.clone())
        .wait_for_group_completion("Default", Duration::from_millis(250))
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Completed { polls: 4 });
    assert_eq!(*sleeper.naps.lock(), [Duration::from_millis(250); 3]);
    let polls = server.calls_to(REQUESTS_PATH);
    assert_eq!(polls.len(), 4);
    assert!(polls.iter().all(|c| c.path == "/manage/v2/requests?server-id=7001"));
}

#[test]
fn wait_returns_at_once_when_idle() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.add_task_server("7001", "Default");
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcome = tasks(&client)
        .with_sleeper(sleeper.clone())
        .wait_for_group_completion("Default", Duration::from_secs(1))
        .unwrap();
    assert_eq!(outcome, WaitOutcome::Completed { polls: 1 });
    assert!(sleeper.naps.lock().is_empty());
}

#[test]
fn wait_for_unknown_group_does_not_poll() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    server.add_task_server("7001", "Default");
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcome = tasks(&client)
        .with_sleeper(sleeper.clone())
        .wait_for_group_completion("Evaluator", Duration::from_secs(1))
        .unwrap();
    assert_eq!(outcome, WaitOutcome::GroupUnresolved);
    assert!(server.calls_to(REQUESTS_PATH).is_empty());
    assert!(sleeper.naps.lock().is_empty());
}
