//! Activation end to end: provision from a mock release host, launch the
//! provisioned server and follow its progress notifications.

use std::path::PathBuf;

use fsls::Activation;
use fsls_lsp::ServerSpec;
use fsls_provision::ProvisionError;
use fsls_types::DownloadChannel;
use tempfile::TempDir;
use wiremock::MockServer;

use crate::common::{
    RecordingBar, SERVER_EXECUTABLE, linux_x64, mirrored_provisioner, mount_archive,
    stand_in_server_archive, wait_for, zip_archive,
};

#[cfg(unix)]
#[tokio::test]
async fn activation_installs_launches_and_tracks_progress() {
    let server = MockServer::start().await;
    mount_archive(&server, "nightly", stand_in_server_archive(), 1).await;

    let dir = TempDir::new().unwrap();
    let install_dir = dir.path().join("server");
    let workspace = dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let activation = Activation::new(
        mirrored_provisioner(&server),
        install_dir.clone(),
        DownloadChannel::Nightly,
    )
    .for_platform(linux_x64());

    let bar = RecordingBar::default();
    let session = activation.activate(&workspace, bar.clone()).await.unwrap();
    assert!(session.supervisor.is_running());
    assert!(install_dir.join(SERVER_EXECUTABLE).is_file());

    let texts = bar.texts.clone();
    let progress = session.progress.clone();
    wait_for(|| texts.lock().unwrap().len() == 4 && !progress.lock().unwrap().is_active()).await;
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

    session.shutdown().await;
}

#[tokio::test]
async fn second_install_reuses_the_executable() {
    let server = MockServer::start().await;
    let archive = zip_archive(&[(SERVER_EXECUTABLE, b"#!/bin/sh\n")]);
    mount_archive(&server, "v1.2.0", archive, 1).await;

    let dir = TempDir::new().unwrap();
    let activation = Activation::new(
        mirrored_provisioner(&server),
        dir.path().join("server"),
        DownloadChannel::SpecificTag("v1.2.0".into()),
    )
    .for_platform(linux_x64());

    let first = activation.install().await.unwrap();
    let second = activation.install().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, dir.path().join("server").join(SERVER_EXECUTABLE));
}

#[tokio::test]
async fn reinstall_fetches_again() {
    let server = MockServer::start().await;
    let archive = zip_archive(&[(SERVER_EXECUTABLE, b"#!/bin/sh\n")]);
    mount_archive(&server, "nightly", archive, 2).await;

    let dir = TempDir::new().unwrap();
    let activation = Activation::new(
        mirrored_provisioner(&server),
        dir.path().join("server"),
        DownloadChannel::Nightly,
    )
    .for_platform(linux_x64());

    activation.install().await.unwrap();
    std::fs::write(dir.path().join("server").join("stale.txt"), "old").unwrap();
    activation.reinstall().await.unwrap();
    assert!(!dir.path().join("server").join("stale.txt").exists());
}

#[tokio::test]
async fn custom_server_skips_provisioning() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let custom = ServerSpec::new("/opt/fsls/FSharpLanguageServer").with_args(["--verbose"]);

    let activation = Activation::new(
        mirrored_provisioner(&server),
        dir.path().join("server"),
        DownloadChannel::Nightly,
    )
    .with_custom_server(custom.clone());

    let spec = activation.server_spec().await.unwrap();
    assert_eq!(spec, custom);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!dir.path().join("server").exists());
}

#[tokio::test]
async fn missing_release_surfaces_download_status() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let activation = Activation::new(
        mirrored_provisioner(&server),
        dir.path().join("server"),
        DownloadChannel::Stable,
    )
    .for_platform(linux_x64());

    let err = activation.server_spec().await.unwrap_err();
    assert!(matches!(err, ProvisionError::DownloadFailed { .. }));
    assert_eq!(err.download_status(), Some(404));

    let activated = activation
        .activate(&PathBuf::from("."), RecordingBar::default())
        .await;
    let message = format!("{:#}", activated.err().unwrap());
    assert!(message.contains("failed to provision"), "{message}");
}
