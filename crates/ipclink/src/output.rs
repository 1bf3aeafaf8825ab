use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ipclink_channel::CallResponse;
use ipclink_transport::Endpoint;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EndpointOutput<'a> {
    endpoint: String,
    context: Option<&'a str>,
    filesystem: bool,
}

pub fn print_response(channel: &str, response: &CallResponse, format: OutputFormat) {
    match (format, response) {
        (OutputFormat::Raw, CallResponse::Raw(bytes)) => print_raw(bytes),
        (OutputFormat::Raw, CallResponse::Json(value)) => print_raw(&compact(value).into_bytes()),
        (OutputFormat::Json, CallResponse::Json(value)) => println!("{}", compact(value)),
        (OutputFormat::Json, CallResponse::Raw(bytes)) => println!("{}", body_preview(bytes)),
        (OutputFormat::Pretty, CallResponse::Json(value)) => println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| compact(value))
        ),
        (OutputFormat::Pretty, CallResponse::Raw(bytes)) => println!("{}", body_preview(bytes)),
        (OutputFormat::Table, response) => {
            let (kind, size, body) = match response {
                CallResponse::Json(value) => {
                    let body = compact(value);
                    ("json", body.len(), body)
                }
                CallResponse::Raw(bytes) => ("raw", bytes.len(), body_preview(bytes)),
            };
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "KIND", "SIZE", "RESPONSE"])
                .add_row(vec![
                    channel.to_string(),
                    kind.to_string(),
                    size.to_string(),
                    body,
                ]);
            println!("{table}");
        }
    }
}

pub fn print_endpoint(endpoint: &Endpoint, context: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EndpointOutput {
                endpoint: endpoint.to_string(),
                context,
                filesystem: endpoint.is_filesystem_backed(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "CONTEXT"])
                .add_row(vec![
                    endpoint.to_string(),
                    context.unwrap_or("<random>").to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "endpoint={} context={}",
                endpoint,
                context.unwrap_or("<random>")
            );
        }
        OutputFormat::Raw => println!("{endpoint}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}
