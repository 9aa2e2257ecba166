use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::util::{env_flag, env_string};

const DEFAULT_FILTER: &str = "livedoc=info";
const LOG_FILTER_ENV: &str = "LIVEDOC_LOG";
const LOG_PATH_ENV: &str = "LIVEDOC_LOG_PATH";
const DEBUG_PAYLOAD_ENV: &str = "LIVEDOC_DEBUG_PAYLOAD";

/// Installs the global fmt subscriber. Logs go to stderr unless `LIVEDOC_LOG_PATH`
/// names a file, in which case they are appended there so they do not interleave
/// with rendered output.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match env_string(LOG_PATH_ENV) {
        Some(path) => {
            let file = open_log_file(Path::new(&path))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn debug_payload_enabled() -> bool {
    env_flag(DEBUG_PAYLOAD_ENV, false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = request_url, "request payload:\n{formatted_payload}");
}
