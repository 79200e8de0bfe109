use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// Print one command result.
///
/// JSON output serializes `record`; the human formats list `fields` in order.
pub fn print_record<T: Serialize>(
    title: &str,
    record: &T,
    fields: &[(&str, String)],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{title}:");
            for (name, value) in fields {
                let label = format!("{name}:");
                println!("  {label:<18}{value}");
            }
        }
    }
}

/// Hex rendering of a payload, cut short for the human formats.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    if data.len() <= limit {
        hex::encode(data)
    } else {
        format!("{}... ({} bytes)", hex::encode(&data[..limit]), data.len())
    }
}
