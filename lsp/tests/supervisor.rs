//! End-to-end supervision against a scripted stand-in server.
//!
//! The stand-in waits for the first request byte, replays a canned frame
//! sequence (initialize response first, so it answers request id 1), and
//! then either lingers until stdin closes or exits.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fsls_lsp::{
    ProgressListener, ServerSpec, ServerStopReason, StatusBar, StatusItem, Supervisor,
};
use serde_json::{Value, json};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBar {
    texts: Arc<Mutex<Vec<String>>>,
    visible: Arc<Mutex<bool>>,
}

struct SharedItem(SharedBar);

impl StatusItem for SharedItem {
    fn set_text(&mut self, text: &str) {
        self.0.texts.lock().unwrap().push(text.to_string());
    }
    fn show(&mut self) {
        *self.0.visible.lock().unwrap() = true;
    }
    fn hide(&mut self) {
        *self.0.visible.lock().unwrap() = false;
    }
}

impl StatusBar for SharedBar {
    fn create_item(&mut self) -> Box<dyn StatusItem> {
        Box::new(SharedItem(self.clone()))
    }
}

fn frame(msg: &Value) -> String {
    let body = msg.to_string();
    format!("Content-Length: {}\r\n\r\n{body}", body.len())
}

fn write_stand_in(dir: &Path, frames: &[Value], linger: bool) -> ServerSpec {
    let canned: String = frames.iter().map(frame).collect();
    fs::write(dir.join("frames.bin"), canned).unwrap();

    let tail = if linger { "cat >/dev/null\n" } else { "" };
    let script = format!("head -c 1 >/dev/null\ncat \"$(dirname \"$0\")/frames.bin\"\n{tail}");
    let path = dir.join("stand-in.sh");
    fs::write(&path, script).unwrap();

    ServerSpec::new("sh").with_args([path.display().to_string()])
}

fn scan_frames() -> Vec<Value> {
    vec![
        json!({"jsonrpc": "2.0", "id": 1, "result": {"capabilities": {}}}),
        json!({"jsonrpc": "2.0", "method": "fsharp/startProgress", "params": {"title": "Checking", "nFiles": 3}}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": "Library.fs"}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": "Program.fs"}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": "Tests.fs"}),
        json!({"jsonrpc": "2.0", "method": "fsharp/endProgress"}),
    ]
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

#[tokio::test]
async fn progress_notifications_drive_the_status_bar() {
    let dir = TempDir::new().unwrap();
    let spec = write_stand_in(dir.path(), &scan_frames(), true);

    let bar = SharedBar::default();
    let listener = Arc::new(Mutex::new(ProgressListener::new(bar.clone())));
    let mut supervisor = Supervisor::new();
    ProgressListener::bind(&listener, supervisor.router());

    supervisor.start(&spec, dir.path()).await.unwrap();
    assert!(supervisor.is_running());

    let texts = Arc::clone(&bar.texts);
    wait_for(|| texts.lock().unwrap().len() == 4 && !listener.lock().unwrap().is_active()).await;

    assert_eq!(
        *bar.texts.lock().unwrap(),
        vec![
            "Checking (0%)...",
            "Checking (25%)... [Library.fs]",
            "Checking (50%)... [Program.fs]",
            "Checking (75%)... [Tests.fs]",
        ]
    );
    assert!(!*bar.visible.lock().unwrap());

    supervisor.stop().await;
    assert!(!supervisor.is_running());
    supervisor.stop().await;
}

#[tokio::test]
async fn server_exit_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let spec = write_stand_in(dir.path(), &scan_frames()[..1], false);

    let mut supervisor = Supervisor::new();
    supervisor.start(&spec, dir.path()).await.unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(5), supervisor.wait_stopped())
        .await
        .unwrap();
    assert_eq!(reason, Some(ServerStopReason::Exited));
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.wait_stopped().await, None);
}

#[tokio::test]
async fn restart_replaces_the_running_server() {
    let dir = TempDir::new().unwrap();
    let spec = write_stand_in(dir.path(), &scan_frames()[..1], true);

    let mut supervisor = Supervisor::new();
    supervisor.start(&spec, dir.path()).await.unwrap();
    supervisor.start(&spec, dir.path()).await.unwrap();
    assert!(supervisor.is_running());

    // The first server's exit must not be mistaken for the second's.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(supervisor.poll_events(8).is_empty());
    assert!(supervisor.is_running());

    supervisor.stop().await;
}

#[tokio::test]
async fn relative_workspace_root_is_accepted() {
    let dir = TempDir::new().unwrap();
    let spec = write_stand_in(dir.path(), &scan_frames()[..1], true);

    let mut supervisor = Supervisor::new();
    supervisor.start(&spec, Path::new(".")).await.unwrap();
    assert!(supervisor.is_running());

    supervisor.start(&spec, Path::new("src/..")).await.unwrap();
    assert!(supervisor.is_running());

    supervisor.stop().await;
}
