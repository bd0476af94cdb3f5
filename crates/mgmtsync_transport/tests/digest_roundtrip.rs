//! Digest authentication against a real socket.

use mgmtsync_transport::{HttpMethod, ManageClient, ManageConfig};
use std::io::Read;
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use tiny_http::{Header, Response, Server};

const CHALLENGE: &str = r#"Digest realm="public", qop="auth", nonce="1634a3f1b2c4", opaque="b1b2""#;

struct Seen {
    method: String,
    url: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

/// Serves `count` requests, challenging any request without credentials.
fn digest_server(count: usize) -> (u16, mpsc::Receiver<Seen>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        for _ in 0..count {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv(name))
                    .map(|h| h.value.as_str().to_string())
            };
            let authorization = header("Authorization");
            let content_type = header("Content-Type");
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);

            let seen = Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                authorization: authorization.clone(),
                content_type,
                body,
            };
            let _ = tx.send(seen);

            let response = match authorization {
                None => Response::from_string("Unauthorized")
                    .with_status_code(401)
                    .with_header(Header::from_bytes(&b"WWW-Authenticate"[..], CHALLENGE.as_bytes()).unwrap()),
                Some(_) => Response::from_string("created")
                    .with_status_code(201)
                    .with_header(
                        Header::from_bytes(&b"Location"[..], &b"/manage/v2/tasks/17007"[..]).unwrap(),
                    ),
            };
            let _ = request.respond(response);
        }
    });

    (port, rx, handle)
}

#[test]
fn challenge_is_cached_across_requests() {
    let (port, rx, handle) = digest_server(3);
    let config = ManageConfig::new("127.0.0.1")
        .with_port(port)
        .with_credentials("deployer", "s3cret");
    let client = ManageClient::connect(config).unwrap();

    let first = client
        .request(
            HttpMethod::Post,
            "/manage/v2/tasks?group-id=Default",
            Some(r#"{"task-path":"/a.xqy"}"#),
            Some(mgmtsync_transport::ContentType::Json),
            false,
        )
        .unwrap();
    assert_eq!(first.status_code(), 201);
    assert_eq!(first.location_id(), Some("17007"));

    let second = client.get_xml("/manage/v2/tasks", false).unwrap();
    assert_eq!(second.status_code(), 201);

    handle.join().unwrap();
    let seen: Vec<Seen> = rx.try_iter().collect();
    assert_eq!(seen.len(), 3, "one challenge plus two authenticated requests");

    assert!(seen[0].authorization.is_none());
    assert_eq!(seen[0].body, r#"{"task-path":"/a.xqy"}"#);

    let retry = seen[1].authorization.as_deref().unwrap();
    assert_eq!(seen[1].method, "POST");
    assert_eq!(seen[1].url, "/manage/v2/tasks?group-id=Default");
    assert_eq!(seen[1].content_type.as_deref(), Some("application/json"));
    assert_eq!(seen[1].body, seen[0].body);
    assert!(retry.starts_with("Digest "));
    assert!(retry.contains(r#"username="deployer""#));
    assert!(retry.contains(r#"realm="public""#));
    assert!(retry.contains(r#"uri="/manage/v2/tasks?group-id=Default""#));
    assert!(retry.contains("nc=00000001"));
    assert!(retry.contains(r#"opaque="b1b2""#));

    let preemptive = seen[2].authorization.as_deref().unwrap();
    assert_eq!(seen[2].method, "GET");
    assert!(preemptive.contains("nc=00000002"));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ManageClient::connect(ManageConfig::new("127.0.0.1").with_port(port)).unwrap();
    let err = client.get_json("/manage/v2", false).unwrap_err();
    assert!(matches!(err, mgmtsync_transport::TransportError::Io { .. }));
}
