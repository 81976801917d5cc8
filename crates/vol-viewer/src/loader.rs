//! Background asset loading.
//!
//! One thread per viewer run: it reads and decodes the requested asset
//! fully, then hands the result to the render thread over a channel the
//! frame loop polls. Failures travel the same channel so they surface on
//! the HUD instead of stalling silently.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread;

use crate::character::CharacterData;

#[derive(Debug, Clone)]
pub enum LoadRequest {
    Volume(PathBuf),
    Character(PathBuf),
}

pub enum LoadedAsset {
    Volume(volarc::Volume),
    Character(Box<CharacterData>),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("volume archive: {0}")]
    Volume(#[from] std::io::Error),
    #[error("character model: {0}")]
    Character(String),
}

pub type LoadResult = Result<LoadedAsset, LoadError>;

/// Channel between the loader thread and the frame loop. Capacity one:
/// each viewer run loads exactly one asset.
pub fn channel() -> (Sender<LoadResult>, Receiver<LoadResult>) {
    bounded(1)
}

/// Spawns the loader thread for one asset.
pub fn spawn(request: LoadRequest, tx: Sender<LoadResult>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let result = match &request {
            LoadRequest::Volume(path) => volarc::read_file(path)
                .map(LoadedAsset::Volume)
                .map_err(LoadError::Volume),
            LoadRequest::Character(path) => CharacterData::load(path)
                .map(|data| LoadedAsset::Character(Box::new(data)))
                .map_err(|e| LoadError::Character(format!("{e:#}"))),
        };

        match &result {
            Ok(LoadedAsset::Volume(v)) => log::info!(
                "loaded volume '{}' ({}x{}x{}, {} bytes)",
                v.name,
                v.dims.width,
                v.dims.height,
                v.dims.depth,
                v.voxels.len()
            ),
            Ok(LoadedAsset::Character(c)) => log::info!(
                "loaded character ({} nodes, {} primitives, {} clips)",
                c.nodes.len(),
                c.primitives.len(),
                c.clips.len()
            ),
            Err(e) => log::error!("asset load failed: {e}"),
        }

        if tx.send(result).is_err() {
            log::debug!("viewer closed before the asset arrived");
        }
    })
}
