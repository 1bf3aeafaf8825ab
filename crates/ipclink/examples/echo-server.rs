//! Echo server that hands its endpoint to a child process.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! The server binds, spawns itself as a client via `IPCLINK_HANDLE`, and
//! prints what the client got back.

use ipclink::{handler_fn, CallOptions, HandlerError, IpcClient, IpcServer, ServerConfig};
use serde_json::json;

const CLIENT_ARG: &str = "--client";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().any(|arg| arg == CLIENT_ARG) {
        return run_client().await;
    }

    let server = IpcServer::bind(ServerConfig::new().with_context("ipclink-echo-example"))?;
    let registration = server.register_handler(
        "echo",
        handler_fn(|request| async move { Ok::<_, HandlerError>(request) }),
    )?;
    eprintln!("Listening on {}", server.endpoint());

    let exe = std::env::current_exe()?;
    let status = tokio::process::Command::new(exe)
        .arg(CLIENT_ARG)
        .envs(server.get_env())
        .status()
        .await?;
    eprintln!("Client exited with {status}");

    registration.dispose();
    server.dispose();
    Ok(())
}

async fn run_client() -> Result<(), Box<dyn std::error::Error>> {
    let client = IpcClient::from_env("echo", None)?;
    for payload in [json!("string"), json!(123), json!({ "message": "hello" })] {
        let response = client.call(&payload, CallOptions::default()).await?;
        println!("{payload} -> {:?}", response.into_json());
    }
    Ok(())
}
