//! Tracing subscriber setup
//!
//! `RUST_LOG` sets the filter, `LOG_FORMAT=json` switches stdout to JSON and
//! `LOG_DIR` adds a daily-rotated JSON file under that directory.

use anyhow::{anyhow, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() -> Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,rag_chat_server=debug".to_string());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let file_layer = match std::env::var("LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("rag-chat")
                .filename_suffix("log")
                .build(dir)?;

            Some(
                fmt::layer()
                    .json()
                    .with_writer(file_appender)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true),
            )
        }
        _ => None,
    };

    let filter = EnvFilter::try_new(&log_level)?;
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    match log_format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stdout)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true),
            )
            .try_init(),
        _ => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stdout)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
    }
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
