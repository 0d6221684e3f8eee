//! A minimal in-process HTTP remote for protocol tests.
//!
//! Serves one request per connection (`Connection: close`), records every
//! request, and delegates responses to a test-supplied handler.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::{Commit, EntryKind, Object, Tree, TreeEntry};

/// A request as seen by the mock remote.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Split a push body into its metadata JSON and pack bytes.
    pub fn push_parts(&self) -> (serde_json::Value, Vec<u8>) {
        let len = u32::from_be_bytes([self.body[0], self.body[1], self.body[2], self.body[3]])
            as usize;
        let meta = serde_json::from_slice(&self.body[4..4 + len]).unwrap();
        (meta, self.body[4 + len..].to_vec())
    }
}

/// A canned response from the handler.
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Canned {
    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: serde_json::to_vec(value).unwrap(),
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "application/octet-stream",
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }
}

type Handler = dyn Fn(&RecordedRequest) -> Canned + Send + Sync;

/// The mock remote itself.
pub struct MockRemote {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockRemote {
    pub fn start(handler: impl Fn(&RecordedRequest) -> Canned + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
        let shutdown: Arc<AtomicBool> = Arc::default();

        let handler: Arc<Handler> = Arc::new(handler);
        let thread_requests = Arc::clone(&requests);
        let thread_shutdown = Arc::clone(&shutdown);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                if thread_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                if let Some(request) = read_request(&stream) {
                    thread_requests.lock().unwrap().push(request.clone());
                    let response = handler(&request);
                    let _ = write_response(&stream, &response);
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of every request seen so far.
    pub fn request_paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.path.clone()).collect()
    }
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Unblock the accept loop.
        let _ = TcpStream::connect(self.addr);
    }
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn write_response(mut stream: &TcpStream, response: &Canned) -> std::io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Error",
    };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    )?;
    stream.write_all(&response.body)?;
    stream.flush()
}

// ---- object graph fixtures ----------------------------------------------

/// An in-memory object set shared by test servers and assertions.
#[derive(Default, Clone)]
pub struct GraphBuilder {
    pub objects: Vec<(ObjectId, vec_object::ObjectKind, Vec<u8>)>,
}

impl GraphBuilder {
    pub fn blob(&mut self, data: &[u8]) -> ObjectId {
        self.push(Object::Blob(vec_object::Blob::new(data.to_vec())))
    }

    pub fn tree(&mut self, entries: &[(&str, ObjectId, EntryKind)]) -> ObjectId {
        let entries = entries
            .iter()
            .map(|(name, oid, kind)| TreeEntry {
                mode: if *kind == EntryKind::Tree { 0o040000 } else { 0o100644 },
                name: BString::from(*name),
                oid: *oid,
                kind: *kind,
            })
            .collect();
        self.push(Object::Tree(Tree::from_entries(entries).unwrap()))
    }

    pub fn commit(&mut self, tree: ObjectId, parents: &[ObjectId], message: &str) -> ObjectId {
        self.push(Object::Commit(Commit {
            tree,
            parents: parents.to_vec(),
            author: "Remote <r@example>".into(),
            committer: "Remote <r@example>".into(),
            timestamp: 1_700_000_000,
            message: BString::from(message),
        }))
    }

    fn push(&mut self, obj: Object) -> ObjectId {
        let oid = obj.id();
        if !self.objects.iter().any(|(existing, _, _)| *existing == oid) {
            self.objects.push((oid, obj.kind(), obj.serialize_payload()));
        }
        oid
    }

    /// Pack up the objects whose digests appear in `wanted`.
    pub fn pack_of(&self, wanted: &[ObjectId]) -> Vec<u8> {
        let subset: Vec<_> = self
            .objects
            .iter()
            .filter(|(oid, _, _)| wanted.contains(oid))
            .cloned()
            .collect();
        vec_pack::write::build_pack(&subset, false).unwrap().bytes
    }

    /// All object ids in insertion order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|(oid, _, _)| *oid).collect()
    }
}
