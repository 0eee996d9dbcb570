//! Dependency wiring from configuration to the sync service.

use std::path::PathBuf;
use std::sync::Arc;

use integration_things::{
    ProcessCommandRunner as ThingsProcessCommandRunner, ThingsClient, ThingsConfig,
};
use taskbridge_config::TaskbridgeConfig;
use taskbridge_domain::CoreError;
use taskbridge_github::{GhCliClient, ProcessCommandRunner as GhProcessCommandRunner};
use taskbridge_store::JsonFileMappingStore;
use taskbridge_sync::SyncService;

pub fn things_config(config: &TaskbridgeConfig) -> ThingsConfig {
    ThingsConfig {
        project: config.things.project.clone(),
        auth_token: config.things.auth_token.clone(),
        osascript_binary: PathBuf::from(config.things.osascript_binary.as_str()),
        open_binary: PathBuf::from(config.things.open_binary.as_str()),
        url_scheme_fallback: config.things.url_scheme_fallback,
    }
}

pub fn github_client(
    config: &TaskbridgeConfig,
) -> Result<GhCliClient<GhProcessCommandRunner>, CoreError> {
    GhCliClient::new(
        GhProcessCommandRunner,
        PathBuf::from(config.github.binary.as_str()),
    )
}

pub fn mapping_store(config: &TaskbridgeConfig) -> Arc<JsonFileMappingStore> {
    Arc::new(JsonFileMappingStore::new(config.state_path()))
}

pub fn build_sync_service(config: &TaskbridgeConfig) -> Result<SyncService, CoreError> {
    let source = Arc::new(github_client(config)?);
    let sink = Arc::new(ThingsClient::new(
        ThingsProcessCommandRunner,
        things_config(config),
    )?);

    Ok(SyncService::new(
        source,
        sink,
        mapping_store(config),
        config.item_query(),
    ))
}
