use ipclink_transport::{resolve_endpoint, EndpointOptions};

use crate::cmd::EndpointArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_endpoint, OutputFormat};

pub fn run(args: EndpointArgs, format: OutputFormat) -> CliResult<i32> {
    let mut options = EndpointOptions::from_env();
    if let Some(dir) = args.runtime_dir {
        options = options.with_runtime_dir(dir);
    }

    let endpoint = resolve_endpoint(args.context.as_deref(), &options)
        .map_err(|err| transport_error("endpoint resolution failed", err))?;

    print_endpoint(&endpoint, args.context.as_deref(), format);
    Ok(SUCCESS)
}
