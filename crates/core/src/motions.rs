//! The built-in motion library and motions advertised by the robot.

use crate::error::StoreError;
use crate::instruction::Move;
use crate::store::MoveStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MOTION_EXTENSION: &str = "qianim";

/// Group given to motions the robot reports it already has.
pub const REMOTE_GROUP: &str = "Remote";

/// Collects `<dir>/<group>/<name>.qianim` files. A missing directory yields
/// no motions.
pub fn collect_moves(dir: &Path) -> std::io::Result<Vec<Move>> {
    let groups = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for group in groups {
        let group = group?.path();
        if !group.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&group)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == MOTION_EXTENSION) {
                files.push(path);
            }
        }
    }
    files.sort();

    Ok(files.into_iter().filter_map(move_from_path).collect())
}

fn move_from_path(path: PathBuf) -> Option<Move> {
    let name = path.file_stem()?.to_string_lossy().into_owned();
    let group = path.parent()?.file_name()?.to_string_lossy().into_owned();
    Some(Move {
        name,
        group,
        file_path: path.to_string_lossy().into_owned(),
        ..Default::default()
    })
}

/// Fills a newly created move store from the motion library. Stores that
/// existed before are left alone, so deleted motions stay deleted.
pub async fn seed_builtin_moves(store: &MoveStore, dir: &Path) -> Result<usize, StoreError> {
    if !store.is_fresh() {
        return Ok(0);
    }
    let dir_owned = dir.to_path_buf();
    let moves = tokio::task::spawn_blocking(move || collect_moves(&dir_owned))
        .await
        .map_err(std::io::Error::other)
        .and_then(|scan| scan)
        .map_err(|source| StoreError::Persistence {
            path: dir.to_path_buf(),
            source,
        })?;
    if moves.is_empty() {
        warn!(dir = %dir.display(), "No built-in motions found");
        return Ok(0);
    }

    let added = store.insert_missing(moves).await?;
    info!(added, dir = %dir.display(), "Built-in motions loaded");
    Ok(added)
}

impl MoveStore {
    /// Records motion names announced by the robot, skipping known names.
    pub async fn add_remote_moves(&self, names: &[String]) -> Result<usize, StoreError> {
        let moves = names
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| Move {
                name: name.clone(),
                group: REMOTE_GROUP.to_string(),
                ..Default::default()
            })
            .collect();
        let added = self.insert_missing(moves).await?;
        if added > 0 {
            info!(added, "Remote motions recorded");
        }
        Ok(added)
    }
}
