//! Full data path: HTTP POST -> UDP relay -> collector -> JSON file.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use formrelay::frontend::{Site, ERROR_DOCUMENT, INDEX_DOCUMENT, MESSAGE_DOCUMENT};
use formrelay::{Collector, FrontEnd, LogEntry, LogStore, Shutdown, UdpRelay};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

struct Harness {
    _dir: tempfile::TempDir,
    http: SocketAddr,
    store: LogStore,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<formrelay::Result<()>>>,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(INDEX_DOCUMENT), "<form method=post></form>").unwrap();
        std::fs::write(root.join(MESSAGE_DOCUMENT), "<p>message</p>").unwrap();
        std::fs::write(root.join(ERROR_DOCUMENT), "<p>missing</p>").unwrap();
        std::fs::write(root.join("app.js"), "console.log(1);").unwrap();

        let store = LogStore::new(dir.path().join("storage"), "data.json");
        let collector = Collector::bind("127.0.0.1:0".parse().unwrap(), store.clone(), true)
            .await
            .unwrap();
        let relay = UdpRelay::new(collector.local_addr().unwrap());

        let frontend = FrontEnd::bind(
            "127.0.0.1:0".parse().unwrap(),
            Site::open(&root).unwrap(),
            Arc::new(relay),
        )
        .await
        .unwrap();
        let http = frontend.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let tasks = vec![
            tokio::spawn(collector.run(shutdown.clone())),
            tokio::spawn(frontend.run(shutdown.clone())),
        ];

        Self {
            _dir: dir,
            http,
            store,
            shutdown,
            tasks,
        }
    }

    async fn request(&self, raw: &str) -> String {
        let mut stream = TcpStream::connect(self.http).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn post(&self, path: &str, body: &str) -> String {
        self.request(&format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
        .await
    }

    async fn get(&self, path: &str) -> String {
        self.request(&format!(
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        ))
        .await
    }

    async fn wait_for_entries(&self, count: usize) -> Vec<LogEntry> {
        for _ in 0..250 {
            let entries = self.store.load().unwrap();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("persisted log never reached {count} entries");
    }

    async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("component should stop")
                .unwrap()
                .unwrap();
        }
    }
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

fn has_header(response: &str, name: &str, value: &str) -> bool {
    response.lines().any(|line| {
        line.split_once(':').is_some_and(|(n, v)| {
            n.trim().eq_ignore_ascii_case(name) && v.trim() == value
        })
    })
}

#[tokio::test]
async fn test_post_is_persisted() {
    let harness = Harness::start().await;

    let response = harness.post("/", "name=Alice&msg=Hi").await;
    assert_eq!(status_line(&response), "HTTP/1.1 302 Found");
    assert!(has_header(&response, "location", "/"));

    let entries = harness.wait_for_entries(1).await;
    let last = entries.last().unwrap();
    assert_eq!(last.record.len(), 2);
    assert_eq!(last.record["name"], "Alice");
    assert_eq!(last.record["msg"], "Hi");

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(harness.store.path()).unwrap()).unwrap();
    let last_value = raw.as_array().unwrap().last().unwrap().as_object().unwrap();
    assert_eq!(
        last_value.values().next().unwrap(),
        &serde_json::json!({"name": "Alice", "msg": "Hi"})
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_malformed_post_is_dropped() {
    let harness = Harness::start().await;

    let response = harness.post("/", "justtext").await;
    assert_eq!(status_line(&response), "HTTP/1.1 302 Found");

    // A valid submission after the bad one proves the collector kept going
    // and that only the valid one was stored.
    harness.post("/message", "a=1&b=2").await;
    let entries = harness.wait_for_entries(1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record["a"], "1");
    assert_eq!(entries[0].record["b"], "2");

    harness.stop().await;
}

#[tokio::test]
async fn test_log_recreated_after_delete() {
    let harness = Harness::start().await;

    harness.post("/", "n=1").await;
    harness.wait_for_entries(1).await;
    std::fs::remove_file(harness.store.path()).unwrap();

    harness.post("/", "n=2").await;
    let entries = harness.wait_for_entries(1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record["n"], "2");

    harness.stop().await;
}

#[tokio::test]
async fn test_static_and_error_pages() {
    let harness = Harness::start().await;

    let response = harness.get("/").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(has_header(&response, "content-type", "text/html"));
    assert!(response.ends_with("<form method=post></form>"));

    let response = harness.get("/app.js").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.ends_with("console.log(1);"));

    let response = harness.get("/../../etc/passwd").await;
    assert_eq!(status_line(&response), "HTTP/1.1 404 Not Found");
    assert!(response.ends_with("<p>missing</p>"));

    harness.stop().await;
}

#[tokio::test]
async fn test_sequential_posts_append_in_order() {
    let harness = Harness::start().await;

    for i in 0..5 {
        harness.post("/", &format!("seq={i}")).await;
        harness.wait_for_entries(i + 1).await;
    }

    let seqs: Vec<_> = harness
        .store
        .load()
        .unwrap()
        .into_iter()
        .map(|e| e.record["seq"].clone())
        .collect();
    assert_eq!(seqs, vec!["0", "1", "2", "3", "4"]);
    assert!(harness.store.path().exists());

    harness.stop().await;
}
