use ipclink_channel::{CallOptions, IpcClient};
use ipclink_transport::Endpoint;
use serde_json::Value;

use crate::cmd::{block_on, CallArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let client = IpcClient::from_env(args.channel, args.endpoint.map(Endpoint::from))
        .map_err(|err| client_error("call failed", err))?;
    let body = request_body(args.json.as_deref(), args.data, args.file.as_deref())?;
    let options = CallOptions {
        disable_marshalling: args.raw,
    };

    tracing::debug!(
        channel = client.channel(),
        endpoint = %client.endpoint(),
        size = body.len(),
        "calling channel"
    );

    let response = block_on(client.call_encoded(body, options))?
        .map_err(|err| client_error("call failed", err))?;

    print_response(client.channel(), &response, format);
    Ok(SUCCESS)
}

fn request_body(
    json: Option<&str>,
    data: Option<String>,
    file: Option<&std::path::Path>,
) -> CliResult<Vec<u8>> {
    if let Some(json) = json {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --json payload: {err}")))?;
        return serde_json::to_vec(&value)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --json payload: {err}")));
    }
    if let Some(data) = data {
        return Ok(data.into_bytes());
    }
    if let Some(path) = file {
        return std::fs::read(path).map_err(|err| io_error("failed to read payload file", err));
    }
    Ok(b"null".to_vec())
}
