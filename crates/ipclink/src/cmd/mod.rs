use std::future::Future;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod call;
pub mod endpoint;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind a server with echo/fail channels and wait for Ctrl-C.
    Serve(ServeArgs),
    /// Call a channel once and print the response.
    Call(CallArgs),
    /// Print the endpoint a server would bind for a context.
    Endpoint(EndpointArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Endpoint(args) => endpoint::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Drive `future` to completion on a single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> CliResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime init failed", err))?;
    Ok(runtime.block_on(future))
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Context string the endpoint is derived from. Random when omitted.
    #[arg(long)]
    pub context: Option<String>,
    /// Directory for the socket file (defaults to XDG_RUNTIME_DIR, then the temp dir).
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,
    /// Channels that echo their request (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "echo")]
    pub echo: Vec<String>,
    /// Channels whose handler always fails (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub fail: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Channel to call.
    pub channel: String,
    /// Endpoint to connect to. Falls back to IPCLINK_HANDLE.
    #[arg(long, value_name = "PATH")]
    pub endpoint: Option<PathBuf>,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Request body sent verbatim.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read the request body from a file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Return the response body without parsing it as JSON.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// Context string. Random when omitted.
    #[arg(long)]
    pub context: Option<String>,
    /// Directory for the socket file.
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build and platform details.
    #[arg(long)]
    pub extended: bool,
}
