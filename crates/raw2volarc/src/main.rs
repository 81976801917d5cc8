use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::{fs, path::PathBuf};
use walkdir::WalkDir;

use volarc::{Volume, VolumeDims};

/// Packs raw 8-bit volume data into a VOLARC archive.
///
/// The input is either a single slab file (`width * height * depth`
/// bytes) or a directory of equally sized per-slice files, stacked in
/// sorted filename order.
#[derive(Parser, Debug, Clone)]
#[command(name = "raw2volarc", version)]
struct Args {
    /// Inspect an existing archive instead of packing one.
    #[arg(long)]
    inspect: Option<PathBuf>,

    /// Raw input: a slab file, or a directory of per-slice files.
    #[arg(long, required_unless_present = "inspect")]
    input: Option<PathBuf>,

    /// Entry tag for the packed volume (e.g. `head`).
    #[arg(long, default_value = "volume")]
    name: String,

    /// Slice width in samples.
    #[arg(long, required_unless_present = "inspect")]
    width: Option<u32>,

    /// Slice height in samples.
    #[arg(long, required_unless_present = "inspect")]
    height: Option<u32>,

    /// Slice count. Derived from the input size when omitted; checked
    /// against it when given.
    #[arg(long)]
    depth: Option<u32>,

    /// Output archive path; defaults to `<tag><W>x<H>x<D>.zip` next to
    /// the input.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overwrite an existing output archive.
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(archive) = &args.inspect {
        return inspect(archive);
    }

    pack(&args)
}

fn inspect(archive: &PathBuf) -> Result<()> {
    let volume = volarc::read_file(archive)
        .with_context(|| format!("reading archive {}", archive.display()))?;

    info!(
        "{}: tag='{}' dims={}x{}x{} ({} bytes, {} per slice)",
        archive.display(),
        volume.name,
        volume.dims.width,
        volume.dims.height,
        volume.dims.depth,
        volume.voxels.len(),
        volume.dims.slice_len()
    );

    Ok(())
}

fn pack(args: &Args) -> Result<()> {
    let input = args.input.as_ref().expect("clap enforces --input");
    let width = args.width.expect("clap enforces --width");
    let height = args.height.expect("clap enforces --height");

    let slice_len = width as usize * height as usize;
    if slice_len == 0 {
        bail!("--width and --height must be non-zero");
    }

    let voxels = if input.is_dir() {
        let slices = collect_slice_files(input)?;
        if slices.is_empty() {
            bail!("no slice files found in '{}'", input.display());
        }
        info!("stacking {} slice files from {}", slices.len(), input.display());
        stack_slices(slices, slice_len)?
    } else {
        fs::read(input).with_context(|| format!("reading {}", input.display()))?
    };

    let depth = resolve_depth(voxels.len(), slice_len, args.depth)?;

    let dims = VolumeDims {
        width,
        height,
        depth,
    };
    let volume = Volume::new(args.name.clone(), dims, voxels)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| input.with_file_name(format!("{}.zip", volume.entry_name())));

    if output.exists() && !args.overwrite {
        bail!(
            "output '{}' already exists (use --overwrite to replace it)",
            output.display()
        );
    }

    volarc::write_file(&output, &volume)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "wrote {} ({}x{}x{}, {} samples)",
        output.display(),
        dims.width,
        dims.height,
        dims.depth,
        volume.voxels.len()
    );

    Ok(())
}

/// Collects slice files directly under `dir` with their payloads, keyed
/// by filename for deterministic stacking order.
fn collect_slice_files(dir: &PathBuf) -> Result<Vec<(String, Vec<u8>)>> {
    let mut slices = Vec::new();

    for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let data = fs::read(entry.path())
            .with_context(|| format!("reading slice {}", entry.path().display()))?;

        slices.push((name, data));
    }

    Ok(slices)
}

/// Concatenates per-slice payloads in sorted filename order, rejecting
/// any slice whose size differs from `slice_len`.
fn stack_slices(mut slices: Vec<(String, Vec<u8>)>, slice_len: usize) -> Result<Vec<u8>> {
    slices.sort_by(|a, b| a.0.cmp(&b.0));

    let mut voxels = Vec::with_capacity(slices.len() * slice_len);
    for (name, data) in &slices {
        if data.len() != slice_len {
            bail!(
                "slice '{name}' is {} bytes, expected {slice_len}",
                data.len()
            );
        }
        voxels.extend_from_slice(data);
    }

    Ok(voxels)
}

/// Derives the slice count from the payload size, cross-checking any
/// explicitly requested depth.
fn resolve_depth(total_len: usize, slice_len: usize, requested: Option<u32>) -> Result<u32> {
    if total_len == 0 || total_len % slice_len != 0 {
        bail!(
            "input is {total_len} bytes, not a whole number of {slice_len}-byte slices"
        );
    }

    let derived = (total_len / slice_len) as u32;
    if let Some(depth) = requested {
        if depth != derived {
            bail!("--depth {depth} does not match input ({derived} slices)");
        }
    }

    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_stack_in_filename_order() {
        let slices = vec![
            ("slice_002.raw".to_owned(), vec![2, 2]),
            ("slice_000.raw".to_owned(), vec![0, 0]),
            ("slice_001.raw".to_owned(), vec![1, 1]),
        ];

        let voxels = stack_slices(slices, 2).unwrap();
        assert_eq!(voxels, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn mismatched_slice_size_is_rejected() {
        let slices = vec![
            ("a.raw".to_owned(), vec![0; 4]),
            ("b.raw".to_owned(), vec![0; 3]),
        ];

        assert!(stack_slices(slices, 4).is_err());
    }

    #[test]
    fn depth_is_derived_and_cross_checked() {
        assert_eq!(resolve_depth(12, 4, None).unwrap(), 3);
        assert_eq!(resolve_depth(12, 4, Some(3)).unwrap(), 3);
        assert!(resolve_depth(12, 4, Some(5)).is_err());
        assert!(resolve_depth(13, 4, None).is_err());
        assert!(resolve_depth(0, 4, None).is_err());
    }
}
