pub mod serve;
pub mod sync;

use anyhow::Context;

use crate::config::AppConfig;
use crate::weclapp::WeclappClient;

pub(crate) fn weclapp_client(config: &AppConfig) -> anyhow::Result<WeclappClient> {
    WeclappClient::new(&config.weclapp).context("failed to build WeClapp HTTP client")
}
