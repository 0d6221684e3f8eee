//! Fetch protocol tests against an in-process mock remote.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::{Canned, GraphBuilder, MockRemote};
use vec_config::{CredentialProvider, Remote};
use vec_hash::ObjectId;
use vec_object::EntryKind;
use vec_protocol::{fetch, CancelToken, FetchOptions, HttpClient, ProtocolError};
use vec_ref::RefName;
use vec_repository::Repository;
use vec_revwalk::reachable;
use vec_utils::progress::Progress;

struct NullSink;

impl io::Write for NullSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quiet_progress() -> Progress {
    Progress::with_sink("", None, Box::new(NullSink))
}

fn setup_repo() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path().join("work")).unwrap();
    (dir, repo)
}

fn client_for(url: &str, home: &std::path::Path) -> HttpClient {
    let remote = Remote {
        name: "origin".into(),
        url: url.to_string(),
        token: None,
        headers: Vec::new(),
    };
    HttpClient::for_remote(&remote, CredentialProvider::for_home(home)).unwrap()
}

/// Local has X; remote has X ← Y ← Z on main. After the fetch, the local
/// store holds Z and everything it reaches, and the tracking ref equals Z.
#[test]
fn fetch_downloads_missing_history() {
    let (dir, repo) = setup_repo();

    // Shared root commit X, present locally.
    let mut graph = GraphBuilder::default();
    let blob_x = graph.blob(b"version one");
    let tree_x = graph.tree(&[("file", blob_x, EntryKind::Blob)]);
    let x = graph.commit(tree_x, &[], "x");

    let store = repo.store();
    for (_, kind, payload) in &graph.objects {
        store.write_raw(*kind, payload).unwrap();
    }
    repo.refs()
        .write(&RefName::branch("main").unwrap(), &x)
        .unwrap();

    // Remote continues the history with Y and Z.
    let blob_z = graph.blob(b"version three");
    let tree_y = graph.tree(&[("file", blob_x, EntryKind::Blob), ("extra", blob_x, EntryKind::Blob)]);
    let y = graph.commit(tree_y, &[x], "y");
    let tree_z = graph.tree(&[("file", blob_z, EntryKind::Blob)]);
    let z = graph.commit(tree_z, &[y], "z");

    let missing: Vec<ObjectId> = graph
        .ids()
        .into_iter()
        .filter(|oid| !store.contains(oid))
        .collect();
    let missing_hex: Vec<String> = missing.iter().map(|oid| oid.to_hex()).collect();
    let pack = graph.pack_of(&missing);

    let z_hex = z.to_hex();
    let server = MockRemote::start(move |req| match req.path.as_str() {
        "/refs/heads" => Canned::json(&serde_json::json!({ "main": z_hex })),
        "/fetch/negotiate" => Canned::json(&serde_json::json!(missing_hex)),
        "/fetch/packfile" => Canned::bytes(pack.clone()),
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), dir.path());
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(outcome.updated, vec![("main".to_string(), z)]);
    assert!(outcome.objects > 0);

    // Tracking ref points at Z.
    let tracking = RefName::remote_tracking("origin", "main").unwrap();
    assert_eq!(repo.refs().resolve(&tracking).unwrap(), Some(z));

    // Z's full closure is present locally.
    let reach = reachable(&store, z).unwrap();
    for oid in reach {
        assert!(store.contains(&oid), "missing {oid}");
    }
}

#[test]
fn empty_negotiation_stops_before_pack_transfer() {
    let (dir, repo) = setup_repo();

    let mut graph = GraphBuilder::default();
    let tree = graph.tree(&[]);
    let tip = graph.commit(tree, &[], "only");
    let store = repo.store();
    for (_, kind, payload) in &graph.objects {
        store.write_raw(*kind, payload).unwrap();
    }
    repo.refs()
        .write(&RefName::branch("main").unwrap(), &tip)
        .unwrap();
    repo.refs()
        .write(&RefName::remote_tracking("origin", "main").unwrap(), &tip)
        .unwrap();

    let tip_hex = tip.to_hex();
    let server = MockRemote::start(move |req| match req.path.as_str() {
        "/refs/heads" => Canned::json(&serde_json::json!({ "main": tip_hex })),
        "/fetch/negotiate" => Canned::json(&serde_json::json!([])),
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), dir.path());
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(outcome.updated.is_empty());
    assert_eq!(outcome.objects, 0);
    assert!(!server.request_paths().contains(&"/fetch/packfile".to_string()));
}

#[test]
fn non_fast_forward_tracking_update_skipped_without_force() {
    let (dir, repo) = setup_repo();
    let store = repo.store();
    let refs = repo.refs();

    // The tracking ref points at a local root commit B...
    let mut local_graph = GraphBuilder::default();
    let tree_b = local_graph.tree(&[]);
    let b = local_graph.commit(tree_b, &[], "b");
    for (_, kind, payload) in &local_graph.objects {
        store.write_raw(*kind, payload).unwrap();
    }
    let tracking = RefName::remote_tracking("origin", "main").unwrap();
    refs.write(&tracking, &b).unwrap();

    // ...while the remote rewrote main to an unrelated root commit A.
    let mut remote_graph = GraphBuilder::default();
    let blob = remote_graph.blob(b"rewritten");
    let tree_a = remote_graph.tree(&[("f", blob, EntryKind::Blob)]);
    let a = remote_graph.commit(tree_a, &[], "a");

    let missing_hex: Vec<String> = remote_graph.ids().iter().map(|o| o.to_hex()).collect();
    let pack = remote_graph.pack_of(&remote_graph.ids());

    let a_hex = a.to_hex();
    let server = MockRemote::start(move |req| match req.path.as_str() {
        "/refs/heads" => Canned::json(&serde_json::json!({ "main": a_hex })),
        "/fetch/negotiate" => Canned::json(&serde_json::json!(missing_hex)),
        "/fetch/packfile" => Canned::bytes(pack.clone()),
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), dir.path());

    // Without force: objects land, but the ref stays put.
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(outcome.skipped, vec!["main".to_string()]);
    assert_eq!(refs.resolve(&tracking).unwrap(), Some(b));

    // With force: the ref moves.
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions {
            force: true,
            ..Default::default()
        },
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(outcome.updated, vec![("main".to_string(), a)]);
    assert_eq!(refs.resolve(&tracking).unwrap(), Some(a));
}

#[test]
fn prune_removes_vanished_tracking_refs_only() {
    let (dir, repo) = setup_repo();
    let refs = repo.refs();

    let mut graph = GraphBuilder::default();
    let tree = graph.tree(&[]);
    let tip = graph.commit(tree, &[], "tip");
    let store = repo.store();
    for (_, kind, payload) in &graph.objects {
        store.write_raw(*kind, payload).unwrap();
    }

    // Two tracking refs; only `main` still exists on the remote.
    refs.write(&RefName::remote_tracking("origin", "main").unwrap(), &tip)
        .unwrap();
    refs.write(&RefName::remote_tracking("origin", "gone").unwrap(), &tip)
        .unwrap();

    let tip_hex = tip.to_hex();
    let server = MockRemote::start(move |req| match req.path.as_str() {
        "/refs/heads" => Canned::json(&serde_json::json!({ "main": tip_hex })),
        "/fetch/negotiate" => Canned::json(&serde_json::json!([])),
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), dir.path());
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions {
            prune: true,
            ..Default::default()
        },
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(outcome.pruned, vec!["gone".to_string()]);
    let remaining = refs.list_remote_tracking("origin").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, "main");
}

#[test]
fn unauthorized_refs_request_refreshes_token_once() {
    let (dir, repo) = setup_repo();

    // A refresh token is on disk; the access token is stale.
    let creds = CredentialProvider::for_home(dir.path());
    creds.store_tokens("origin", "stale-token", "refresh-1").unwrap();

    let served_refresh = Arc::new(Mutex::new(0u32));
    let served_refresh_handler = Arc::clone(&served_refresh);

    let server = MockRemote::start(move |req| match req.path.as_str() {
        "/refs/heads" => {
            if req.bearer_token() == Some("fresh-token") {
                Canned::json(&serde_json::json!({}))
            } else {
                Canned::status(401)
            }
        }
        "/refresh" => {
            *served_refresh_handler.lock().unwrap() += 1;
            Canned::json(&serde_json::json!({
                "token": "fresh-token",
                "refreshToken": "refresh-2"
            }))
        }
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), dir.path());
    let outcome = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(outcome.updated.is_empty());
    assert_eq!(*served_refresh.lock().unwrap(), 1);

    // The rotated pair was persisted.
    let creds = CredentialProvider::for_home(dir.path());
    assert_eq!(
        creds.token("origin", None).unwrap().as_deref(),
        Some("fresh-token")
    );
    assert_eq!(
        creds.refresh_token("origin").unwrap().as_deref(),
        Some("refresh-2")
    );
}

#[test]
fn auth_failure_without_refresh_token_surfaces() {
    let (dir, repo) = setup_repo();

    let server = MockRemote::start(|_| Canned::status(401));
    let client = client_for(&server.url(), dir.path());

    let err = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ProtocolError::Auth(_)));
}

#[test]
fn login_persists_token_pair() {
    let home = tempfile::tempdir().unwrap();

    let server = MockRemote::start(|req| match req.path.as_str() {
        "/login" => {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            if body["user"] == "dev" && body["pass"] == "hunter2" {
                Canned::json(&serde_json::json!({
                    "token": "logged-in",
                    "refreshToken": "refresh-0"
                }))
            } else {
                Canned::status(401)
            }
        }
        _ => Canned::status(404),
    });

    let client = client_for(&server.url(), home.path());
    client.login("dev", "hunter2").unwrap();

    let creds = CredentialProvider::for_home(home.path());
    assert_eq!(
        creds.token("origin", None).unwrap().as_deref(),
        Some("logged-in")
    );
    assert_eq!(
        creds.refresh_token("origin").unwrap().as_deref(),
        Some("refresh-0")
    );
}

#[test]
fn cancelled_before_start_does_nothing() {
    let (dir, repo) = setup_repo();
    let server = MockRemote::start(|_| Canned::status(500));
    let client = client_for(&server.url(), dir.path());

    let cancel = CancelToken::new();
    cancel.cancel();

    let err = fetch(
        &repo,
        &client,
        &FetchOptions::default(),
        &mut quiet_progress(),
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, ProtocolError::Cancelled));
    assert!(server.requests().is_empty());
}
