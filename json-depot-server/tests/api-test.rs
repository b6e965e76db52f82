//! Tests which start the binary and call the api.

use std::path::Path;
use std::time::Duration;

use httpc_test::Client;
use json_depot_api::api::{
    CommandBody, CommandFailureBody, DataBody, Envelope, ErrorBody, FilesBody, HealthResponse,
    MessageBody, SplitBody, ROUTE_NOT_FOUND,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::process::Child;

/// A running server with its own data directory.
struct Server {
    child: Child,
    hc: Client,
    data_dir: TempDir,
}

impl Server {
    /// Starts the binary and waits until it answers the health probe.
    async fn spawn() -> anyhow::Result<Server> {
        let data_dir = tempfile::tempdir()?;
        // IANA recommended port range.
        let port = fastrand::u16(49152..65535);
        let child = tokio::process::Command::new(env!("CARGO_BIN_EXE_json-depot-server"))
            .kill_on_drop(true)
            .args(["--host", "127.0.0.1"])
            .args(["--port", &port.to_string()])
            .arg("--data-dir")
            .arg(data_dir.path())
            .spawn()
            .expect("Couldn't spawn server");
        let hc = httpc_test::new_client(format!("http://localhost:{port}"))?;

        for _ in 0..100 {
            if hc.do_get("/api/health").await.is_ok() {
                return Ok(Server {
                    child,
                    hc,
                    data_dir,
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not come up on port {port}")
    }

    fn path(&self) -> &Path {
        self.data_dir.path()
    }

    async fn stop(mut self) {
        self.child.kill().await.expect("Couldn't kill server");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn health() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    let response = server.hc.do_get("/api/health").await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 200);
    let health: HealthResponse = response.json_body_as()?;
    assert_eq!(health.status, "ok");
    assert!(health.uptime >= 0.0);
    assert!(health.timestamp.ends_with('Z'));

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn write_then_read_documents() -> anyhow::Result<()> {
    let server = Server::spawn().await?;
    let primary = json!({"players": [{"name": "a", "score": 3}], "season": 14});
    let secondary = json!([1, "two", null]);

    let response = server.hc.do_post("/api/data", primary.clone()).await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 200);
    let written: Envelope<MessageBody> = response.json_body_as()?;
    assert!(written.success);
    assert_eq!(written.body.message, "Data updated successfully");

    let response = server.hc.do_post("/api/data2", secondary.clone()).await?;
    assert_eq!(response.status().as_u16(), 200);

    let read: Envelope<DataBody> = server.hc.do_get("/api/data").await?.json_body_as()?;
    assert!(read.success);
    assert_eq!(read.body.data, primary);
    let read: Envelope<DataBody> = server.hc.do_get("/api/data2").await?.json_body_as()?;
    assert_eq!(read.body.data, secondary);

    assert!(server.path().join("riot-output.json").is_file());
    assert!(server.path().join("riot-output-2.json").is_file());

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn missing_document_is_server_error() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    let response = server.hc.do_get("/api/data2").await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 500);
    let error: Envelope<ErrorBody> = response.json_body_as()?;
    assert!(!error.success);
    assert!(error.body.error.contains("riot-output-2.json"));

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_json_body_is_rejected() -> anyhow::Result<()> {
    let server = Server::spawn().await?;
    std::fs::write(server.path().join("riot-output.json"), r#"{"kept": true}"#)?;

    let response = server.hc.do_post("/api/data", "{ not json").await?;
    assert_eq!(response.status().as_u16(), 400);
    let response = server.hc.do_post("/api/data", "").await?;
    assert_eq!(response.status().as_u16(), 400);

    let read: Envelope<DataBody> = server.hc.do_get("/api/data").await?.json_body_as()?;
    assert_eq!(read.body.data, json!({"kept": true}));

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn split_documents() -> anyhow::Result<()> {
    let server = Server::spawn().await?;
    std::fs::write(
        server.path().join("riot-output_split_3.json"),
        r#"[{"id": 1}, {"id": 2}]"#,
    )?;

    let response = server.hc.do_get("/api/data/3").await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 200);
    let split: Envelope<SplitBody> = response.json_body_as()?;
    assert_eq!(split.body.split_number.get(), 3);
    assert_eq!(split.body.item_count, 2);
    assert_eq!(split.body.data, json!([{"id": 1}, {"id": 2}]));

    for out_of_range in ["0", "21", "-1", "abc", "1.5"] {
        let response = server.hc.do_get(&format!("/api/data/{out_of_range}")).await?;
        assert_eq!(response.status().as_u16(), 400, "{out_of_range}");
        let error: Envelope<ErrorBody> = response.json_body_as()?;
        assert_eq!(error.body.error, "Split number must be between 1 and 20");
    }

    let response = server.hc.do_get("/api/data/4").await?;
    assert_eq!(response.status().as_u16(), 404);
    let error: Envelope<ErrorBody> = response.json_body_as()?;
    assert!(!error.success);

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn list_files() -> anyhow::Result<()> {
    let server = Server::spawn().await?;
    for name in [
        "riot-output.json",
        "riot-output_split_10.json",
        "riot-output_split_2.json",
        "riot-output_split_99.json",
        "readme.txt",
    ] {
        std::fs::write(server.path().join(name), "{}")?;
    }

    let response = server.hc.do_get("/api/files").await?;
    response.print().await?;
    let files: Envelope<FilesBody> = response.json_body_as()?;
    assert!(files.success);
    assert_eq!(
        files.body.files,
        [
            "riot-output.json",
            "riot-output_split_10.json",
            "riot-output_split_2.json",
            "riot-output_split_99.json",
        ]
    );
    assert_eq!(files.body.total_files, 4);
    assert_eq!(files.body.split_files, 2);
    let splits: Vec<u8> = files.body.available_splits.iter().map(|s| s.get()).collect();
    assert_eq!(splits, [2, 10]);
    assert_eq!(files.body.info.split_pattern, "riot-output_split_<n>.json");

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn echo_command() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    let response = server
        .hc
        .do_post("/api/command", json!({"command": "echo hello"}))
        .await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 200);
    let output: Envelope<CommandBody> = response.json_body_as()?;
    assert!(output.success);
    assert!(output.body.stdout.contains("hello"));
    assert_eq!(output.body.stderr, "");
    assert_eq!(output.body.command, "echo hello");

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn command_is_required() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    for body in [json!({}), json!({"command": ""}), json!({"timeout": 10})] {
        let response = server.hc.do_post("/api/command", body).await?;
        assert_eq!(response.status().as_u16(), 400);
        let error: Envelope<ErrorBody> = response.json_body_as()?;
        assert!(!error.success);
        assert_eq!(error.body.error, "Command is required");
    }

    let response = server.hc.do_post("/api/command", "").await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 400);

    let response = server
        .hc
        .do_post("/api/command", json!({"command": "echo hi", "timeout": "100"}))
        .await?;
    assert_eq!(response.status().as_u16(), 400);
    let error: Envelope<ErrorBody> = response.json_body_as()?;
    assert!(error.body.error.starts_with("Invalid request body: "));

    server.stop().await;
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "current_thread")]
async fn failing_command_returns_output() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    let response = server
        .hc
        .do_post(
            "/api/command",
            json!({"command": "echo before; echo broken >&2; exit 2"}),
        )
        .await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 500);
    let failure: Envelope<CommandFailureBody> = response.json_body_as()?;
    assert!(!failure.success);
    assert_eq!(failure.body.stdout, "before\n");
    assert_eq!(failure.body.stderr, "broken\n");
    assert!(failure.body.error.contains("exit status: 2"));

    server.stop().await;
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "current_thread")]
async fn command_timeout() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    let response = server
        .hc
        .do_post("/api/command", json!({"command": "sleep 10", "timeout": 100}))
        .await?;
    response.print().await?;
    assert_eq!(response.status().as_u16(), 500);
    let failure: Envelope<CommandFailureBody> = response.json_body_as()?;
    assert_eq!(failure.body.error, "Command timed out after 100ms");
    assert_eq!(failure.body.command, "sleep 10");

    server.stop().await;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_routes() -> anyhow::Result<()> {
    let server = Server::spawn().await?;

    for path in ["/api/nonexistent", "/", "/api/data/1/extra", "/api/command"] {
        let response = server.hc.do_get(path).await?;
        assert_eq!(response.status().as_u16(), 404, "{path}");
        assert_eq!(
            response.json_body()?,
            json!({"success": false, "error": ROUTE_NOT_FOUND})
        );
    }

    server.stop().await;
    Ok(())
}
