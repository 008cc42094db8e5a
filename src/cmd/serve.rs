//! Board server command: `taskorder serve`.

use std::path::PathBuf;

use anyhow::Result;
use taskorder::board::{ServerConfig, start_server};
use taskorder::config::TaskorderToml;

pub async fn cmd_serve(
    config: &TaskorderToml,
    db_path: PathBuf,
    port: Option<u16>,
    dev: bool,
) -> Result<()> {
    start_server(ServerConfig {
        port: port.unwrap_or_else(|| config.port()),
        db_path,
        dev_mode: dev,
        policy: config.policy()?,
    })
    .await
}
