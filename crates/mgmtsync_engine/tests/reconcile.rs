//! Integration tests for reconciliation of security resources.

use mgmtsync_engine::{
    CertificateAuthorities, DeleteOutcome, ReconcileError, ReconcileState, ResourceKind,
    ResourceManager, SaveAction,
};
use mgmtsync_payload::Payload;
use mgmtsync_testkit::prelude::*;
use mgmtsync_transport::HttpMethod;

#[test]
fn applying_user_twice_creates_then_updates() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let users = ResourceManager::new(&client, ResourceKind::User);

    let first = users.create_or_update(&user_payload("jane")).unwrap();
    assert_eq!(first.action(), SaveAction::Created);
    assert_eq!(first.resource_id(), Some("jane"));
    assert!(first.has_location_header());

    let second = users.create_or_update(&user_payload("jane")).unwrap();
    assert_eq!(second.action(), SaveAction::Updated);
    assert_eq!(second.path(), "/manage/v2/users/jane/properties");
    assert!(!second.has_location_header());

    assert_eq!(server.resources(USERS).len(), 1);
    let methods: Vec<_> = server.mutations().iter().map(|c| c.method).collect();
    assert_eq!(methods, [HttpMethod::Post, HttpMethod::Put]);
    assert_eq!(users.state(), ReconcileState::Done);

    let stats = users.stats();
    assert_eq!(stats.creates, 1);
    assert_eq!(stats.updates, 1);
}

#[test]
fn security_kinds_use_elevated_channel() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    assert!(client.has_separate_elevated_channel());

    ResourceManager::new(&client, ResourceKind::Role)
        .create_or_update(&role_payload("reader"))
        .unwrap();
    ResourceManager::new(&client, ResourceKind::Task)
        .create_or_update(&TaskFixture::new("/a.xqy").payload())
        .unwrap();

    for call in server.calls_to(ROLES) {
        assert_eq!(call.channel, Channel::Secondary, "{}", call.path);
    }
    for call in server.calls_to(TASKS) {
        assert_eq!(call.channel, Channel::Primary, "{}", call.path);
    }
}

#[test]
fn without_security_user_everything_uses_primary() {
    let server = FakeManageServer::new();
    let client = server.client(single_user_config());
    ResourceManager::new(&client, ResourceKind::User)
        .create_or_update(&user_payload("jane"))
        .unwrap();

    assert!(!server.calls().is_empty());
    assert!(server.calls().iter().all(|c| c.channel == Channel::Primary));
}

#[test]
fn xml_payloads_are_reconciled() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let roles = ResourceManager::new(&client, ResourceKind::Role);
    let payload = Payload::new(
        r#"<role-properties xmlns="http://marklogic.com/manage"><role-name>writer</role-name></role-properties>"#,
    );

    roles.create_or_update(&payload).unwrap();
    let receipt = roles.create_or_update(&payload).unwrap();

    assert_eq!(receipt.action(), SaveAction::Updated);
    assert_eq!(receipt.resource_id(), Some("writer"));
    assert!(roles.exists("writer").unwrap());
    assert_eq!(roles.list_names().unwrap(), ["writer"]);
}

#[test]
fn missing_natural_key_is_malformed() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let users = ResourceManager::new(&client, ResourceKind::User);

    let err = users
        .create_or_update(&Payload::new(r#"{"password":"x"}"#))
        .unwrap_err();
    assert!(matches!(err, ReconcileError::MalformedPayload(_)));
    assert!(server.mutations().is_empty());
    assert_eq!(users.state(), ReconcileState::Failed);
    assert!(users.stats().last_error.is_some());
}

#[test]
fn protected_paths_resolve_by_expression() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let paths = ResourceManager::new(&client, ResourceKind::ProtectedPath);

    let created = paths
        .create_or_update(&protected_path_payload("/test:element"))
        .unwrap();
    let id = created.resource_id().unwrap().to_string();
    assert_ne!(id, "test:element");

    let updated = paths
        .create_or_update(&protected_path_payload("/test:element"))
        .unwrap();
    assert_eq!(updated.action(), SaveAction::Updated);
    assert_eq!(updated.resource_id(), Some(id.as_str()));
    assert_eq!(server.resources(PROTECTED_PATHS).len(), 1);

    assert_eq!(paths.delete(&id).unwrap(), DeleteOutcome::Deleted(id.clone()));
    assert!(server.resources(PROTECTED_PATHS).is_empty());
}

#[test]
fn delete_of_unknown_key_is_not_found() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let users = ResourceManager::new(&client, ResourceKind::User);

    assert_eq!(users.delete("nobody").unwrap(), DeleteOutcome::NotFound);
    assert_eq!(
        users.delete_payload(&user_payload("nobody")).unwrap(),
        DeleteOutcome::NotFound
    );
    assert!(server.mutations().is_empty());
}

#[test]
fn delete_by_name_removes_user() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let id = server.seed(USERS, None, serde_json::json!({"user-name": "jane"}));
    let users = ResourceManager::new(&client, ResourceKind::User);

    assert!(users.exists("jane").unwrap());
    assert_eq!(users.delete("jane").unwrap(), DeleteOutcome::Deleted(id));
    assert!(!users.exists("jane").unwrap());
    assert_eq!(users.stats().deletes, 1);
}

#[test]
fn server_rejections_surface_status() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    server.fail_on(HttpMethod::Post, USERS, 403);

    let err = ResourceManager::new(&client, ResourceKind::User)
        .create_or_update(&user_payload("jane"))
        .unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert!(err.is_fatal());
}

#[test]
fn transport_failures_are_not_remote_errors() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    server.go_offline();

    let users = ResourceManager::new(&client, ResourceKind::User);
    let err = users.create_or_update(&user_payload("jane")).unwrap_err();
    assert!(matches!(err, ReconcileError::Transport(_)));
    assert_eq!(users.state(), ReconcileState::Failed);
}

#[test]
fn bulk_toggles_are_unsupported_for_users() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let users = ResourceManager::new(&client, ResourceKind::User);

    assert!(matches!(
        users.enable_all(),
        Err(ReconcileError::UnsupportedOperation { kind: "user", .. })
    ));
    assert!(server.calls().is_empty());
}

#[test]
fn certificate_authorities_round_trip() {
    let server = FakeManageServer::new();
    let client = server.client(elevated_config());
    let authorities = CertificateAuthorities::new(&client);

    let response = authorities.create(TEST_CA_PEM).unwrap();
    let id = response.location_id().unwrap().to_string();
    assert_eq!(authorities.list_identities().unwrap(), [id.clone()]);

    let post = &server.mutations()[0];
    assert_eq!(post.body.as_deref(), Some(TEST_CA_PEM));
    assert_eq!(post.channel, Channel::Secondary);

    authorities.delete(&id).unwrap();
    assert!(authorities.list_identities().unwrap().is_empty());
}
