use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `vol-viewer` - desktop viewer for volumetric slice stacks and animated
/// glTF characters.
///
/// Each invocation runs exactly one flow: `slices` sweeps through the
/// layers of a VOLARC volume archive, `character` plays the first
/// animation clip of a glTF model over a ground grid.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub flow: Flow,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Flow {
    /// Sweep back and forth through the slices of a volume archive.
    Slices {
        /// Path to the archive (zip holding one `<tag><W>x<H>x<D>` raw entry).
        #[arg(env = "VOL_VIEWER_ARCHIVE")]
        archive: PathBuf,

        /// Signed depth increment applied once per rendered frame.
        #[arg(long, default_value_t = 0.4)]
        depth_step: f32,

        /// Starting depth; defaults to the middle of the stack.
        #[arg(long)]
        depth_start: Option<f32>,
    },

    /// Load an animated character model and play its first clip on loop.
    Character {
        /// Path to the `.gltf` / `.glb` model file.
        #[arg(env = "VOL_VIEWER_MODEL")]
        model: PathBuf,
    },
}

impl Flow {
    /// Asset path this flow will load.
    pub fn asset_path(&self) -> &PathBuf {
        match self {
            Flow::Slices { archive, .. } => archive,
            Flow::Character { model } => model,
        }
    }
}
