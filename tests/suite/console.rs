//! The console configured from TOML, fed through the stdin driver.

#![cfg(unix)]

use std::time::Duration;

use fsls::repl::drive;
use fsls_config::FslsConfig;
use fsls_console::{ConsoleExitReason, ConsoleManager, ProcessTerminalHost};
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};

#[tokio::test]
async fn configured_console_receives_terminated_statements() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("received.fsx");
    let config: FslsConfig = toml::from_str(&format!(
        r#"
        [console]
        program = "sh"
        args = ["-c", "head -n 2 > '{}'"]
        title = "Recorder"
        "#,
        out.display()
    ))
    .unwrap();

    let mut consoles = ConsoleManager::new(ProcessTerminalHost, config.console_spec());
    let (mut writer, reader) = tokio::io::duplex(256);
    writer.write_all(b"let x = 1\n").await.unwrap();

    let exit = tokio::time::timeout(
        Duration::from_secs(5),
        drive(&mut consoles, BufReader::new(reader)),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(exit.reason, ConsoleExitReason::Exited(Some(0)));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "let x = 1\n;;\n");
    drop(writer);
}
