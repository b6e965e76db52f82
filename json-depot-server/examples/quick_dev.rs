//! Pokes a locally running server, start it with `cargo run` first.

use json_depot_api::api::{CommandBody, Envelope};
use serde_json::{json, Value};

const URL: &str = "http://localhost:3000";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let hc = httpc_test::new_client(URL)?;

    hc.do_get("/api/health").await?.print().await?;
    hc.do_get("/api/files").await?.print().await?;
    hc.do_get("/api/data/1").await?.print().await?;

    let response = hc.do_post("/api/command", pwd()).await?;
    response.print().await?;
    let json: Envelope<CommandBody> = serde_json::from_value(response.json_body()?)?;
    println!("PWD: {}", json.body.stdout.trim());

    Ok(())
}

fn pwd() -> Value {
    json!({
        "command": "pwd",
        "timeout": 1000,
    })
}
