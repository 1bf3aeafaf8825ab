use std::io::Write;

use ipclink_channel::{handler_fn, HandlerError, IpcServer, Registration, ServerConfig};
use ipclink_transport::EndpointOptions;
use serde_json::Value;

use crate::cmd::{block_on, ServeArgs};
use crate::exit::{io_error, server_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    block_on(serve(args))?
}

async fn serve(args: ServeArgs) -> CliResult<i32> {
    let mut options = EndpointOptions::from_env();
    if let Some(dir) = args.runtime_dir {
        options = options.with_runtime_dir(dir);
    }
    let mut config = ServerConfig::new().with_endpoint_options(options);
    if let Some(context) = args.context {
        config = config.with_context(context);
    }

    let server = IpcServer::bind(config).map_err(|err| server_error("bind failed", err))?;
    let registrations = register_channels(&server, &args.echo, &args.fail)?;

    for (key, value) in server.get_env() {
        println!("{key}={value}");
    }
    let _ = std::io::stdout().flush();

    tracing::info!(
        endpoint = %server.endpoint(),
        echo = ?args.echo,
        fail = ?args.fail,
        "serving; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| io_error("failed to wait for Ctrl-C", err))?;

    tracing::info!("shutting down");
    for registration in &registrations {
        registration.dispose();
    }
    server.dispose();
    Ok(SUCCESS)
}

fn register_channels(
    server: &IpcServer,
    echo: &[String],
    fail: &[String],
) -> CliResult<Vec<Registration>> {
    let mut registrations = Vec::with_capacity(echo.len() + fail.len());

    for channel in echo.iter().filter(|c| !c.is_empty()) {
        let registration = server
            .register_handler(
                channel,
                handler_fn(|request: Value| async move { Ok::<_, HandlerError>(request) }),
            )
            .map_err(|err| server_error("register failed", err))?;
        registrations.push(registration);
    }

    for channel in fail.iter().filter(|c| !c.is_empty()) {
        let name = channel.clone();
        let registration = server
            .register_handler(
                channel,
                handler_fn(move |_request: Value| {
                    let name = name.clone();
                    async move {
                        Err::<Value, HandlerError>(format!("channel {name} always fails").into())
                    }
                }),
            )
            .map_err(|err| server_error("register failed", err))?;
        registrations.push(registration);
    }

    Ok(registrations)
}
