//! Shared test utilities and fixtures
//!
//! A mock release host serving zip archives, and a scripted stand-in for
//! the language server that replays canned JSON-RPC frames.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use fsls_lsp::{StatusBar, StatusItem};
use fsls_provision::{Provisioner, ReleaseRepository};
use fsls_types::{Arch, Os, PlatformSignature};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const LINUX_ARCHIVE: &str = "coc-fsharp-linux-x64.zip";
pub const SERVER_EXECUTABLE: &str = "FSharpLanguageServer";

pub fn linux_x64() -> PlatformSignature {
    PlatformSignature::new(Os::Linux, Arch::X64)
}

pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default().unix_permissions(0o644))
            .unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn frame(msg: &Value) -> String {
    let body = msg.to_string();
    format!("Content-Length: {}\r\n\r\n{body}", body.len())
}

/// A server that answers `initialize`, reports a three-file scan, then
/// idles until its stdin closes.
pub fn stand_in_server_archive() -> Vec<u8> {
    let frames: String = [
        json!({"jsonrpc": "2.0", "id": 1, "result": {"capabilities": {}}}),
        json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {"type": 3, "message": "Loaded"}}),
        json!({"jsonrpc": "2.0", "method": "fsharp/startProgress", "params": {"title": "Checking", "nFiles": 3}}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": "Library.fs"}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": ["Program.fs"]}),
        json!({"jsonrpc": "2.0", "method": "fsharp/incrementProgress", "params": "Tests.fs"}),
        json!({"jsonrpc": "2.0", "method": "fsharp/endProgress"}),
    ]
    .iter()
    .map(frame)
    .collect();

    let script = "#!/bin/sh\nhead -c 1 >/dev/null\ncat \"$(dirname \"$0\")/frames.bin\"\ncat >/dev/null\n";
    zip_archive(&[
        (SERVER_EXECUTABLE, script.as_bytes()),
        ("frames.bin", frames.as_bytes()),
    ])
}

/// The built-in release table, served from `server` instead of GitHub.
pub fn mirrored_provisioner(server: &MockServer) -> Provisioner {
    let repo = ReleaseRepository::builtin().mirrored(&format!("{}/RELEASE", server.uri()));
    Provisioner::new(repo)
}

pub async fn mount_archive(server: &MockServer, release: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{release}/{LINUX_ARCHIVE}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("content-type", "application/zip"),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Records what a status indicator would have shown.
#[derive(Clone, Default)]
pub struct RecordingBar {
    pub texts: Arc<Mutex<Vec<String>>>,
    pub visible: Arc<Mutex<bool>>,
}

struct RecordingItem(RecordingBar);

impl StatusItem for RecordingItem {
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

impl StatusBar for RecordingBar {
    fn create_item(&mut self) -> Box<dyn StatusItem> {
        Box::new(RecordingItem(self.clone()))
    }
}

pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}
