// World-file persistence. The file holds the same JSON encoding a list
// response carries, so a saved world can be inspected with ordinary tools
// and round-trips through the push pipeline on load.

use crate::auth::Ability;
use crate::entity::Entity;
use crate::world::WorldServer;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

#[cfg(test)]
mod tests;

/// Load a world file and bulk-push its entities into head state. A missing
/// file is not an error; the server simply starts empty.
pub fn load_world_file(world: &WorldServer, path: &Path) -> Result<usize> {
    if !path.exists() {
        info!(path = %path.display(), "no world file, starting empty");
        return Ok(0);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read world file {}", path.display()))?;
    let entities: Vec<Entity> =
        serde_json::from_str(&contents).context("failed to parse world file")?;
    let count = entities.len();

    world
        .push(&Ability::default(), entities)
        .context("failed to load entities into world")?;

    info!(path = %path.display(), entities = count, "world file loaded");
    Ok(count)
}

/// Write the current head snapshot, sorted by id, atomically (temp file
/// plus rename).
pub fn save_world_file(world: &WorldServer, path: &Path) -> Result<()> {
    let entities = world.list(&Ability::default(), None);
    let json = serde_json::to_string_pretty(&entities).context("failed to encode world state")?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)
        .with_context(|| format!("failed to write world file {}", tmp.display()))?;
    fs::rename(&tmp, path).context("failed to replace world file")?;

    Ok(())
}

/// Periodically flush head state back to the world file. Spawned from
/// `main` when persistence is configured.
pub async fn run_flush_loop(world: Arc<WorldServer>, path: PathBuf, every: Duration) {
    let mut ticker = interval(every);
    // The first tick fires immediately; skip it so startup load and first
    // flush do not race
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match save_world_file(&world, &path) {
            Ok(()) => info!(path = %path.display(), "world file flushed"),
            Err(e) => error!(error = %e, "failed to flush world file"),
        }
    }
}
