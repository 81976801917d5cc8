//! VOLARC: zip-packed raw volume archives for layered-texture viewers.
//!
//! - One archive holds one raw voxel slab as a single entry.
//! - The entry name encodes the dimensions: `<tag><W>x<H>x<D>`
//!   (e.g. `head256x256x109` is a 256x256 slab of 109 slices).
//! - Samples are 8-bit, row-major within a slice, slices packed in z order,
//!   one byte per sample. Entry payload length must equal `W*H*D`.
//! - The container is a standard zip (deflate); the archive is inflated
//!   fully in memory before use.
//!
//! The reader accepts any entry whose final path segment parses as a
//! volume name; the first such entry wins. Directory prefixes inside the
//! archive are ignored.

use std::fs::File;
use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Width/height/depth of a voxel slab, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDims {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl VolumeDims {
    /// Total sample count (`width * height * depth`), checked against
    /// usize overflow.
    #[inline]
    pub fn sample_count(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.depth as usize)
    }

    /// Samples per slice (`width * height`).
    #[inline]
    pub fn slice_len(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A fully decoded volume: the entry tag, its dimensions, and the raw
/// 8-bit samples.
#[derive(Debug, Clone)]
pub struct Volume {
    pub name: String,
    pub dims: VolumeDims,
    pub voxels: Vec<u8>,
}

impl Volume {
    /// Builds a volume after validating the payload length against the
    /// dimensions.
    pub fn new(name: impl Into<String>, dims: VolumeDims, voxels: Vec<u8>) -> io::Result<Self> {
        let expect = dims
            .sample_count()
            .ok_or_else(|| bad("volume dimensions overflow"))?;

        if dims.width == 0 || dims.height == 0 || dims.depth == 0 {
            return Err(bad("volume dimensions must be non-zero"));
        }

        if voxels.len() != expect {
            return Err(bad(&format!(
                "payload length {} does not match dimensions {}x{}x{} ({} samples)",
                voxels.len(),
                dims.width,
                dims.height,
                dims.depth,
                expect
            )));
        }

        Ok(Self {
            name: name.into(),
            dims,
            voxels,
        })
    }

    /// The canonical entry name for this volume (`<tag><W>x<H>x<D>`).
    pub fn entry_name(&self) -> String {
        format!(
            "{}{}x{}x{}",
            self.name, self.dims.width, self.dims.height, self.dims.depth
        )
    }

    /// Borrow one z slice (row-major `width * height` samples).
    pub fn slice(&self, z: u32) -> Option<&[u8]> {
        if z >= self.dims.depth {
            return None;
        }
        let len = self.dims.slice_len();
        let start = z as usize * len;
        self.voxels.get(start..start + len)
    }
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Splits a volume entry name into its tag and dimensions.
///
/// The final path segment must end in a `<W>x<H>x<D>` decimal triple;
/// everything before the triple is the tag (which may be empty). Returns
/// `None` when the triple is absent or a dimension is zero.
pub fn parse_entry_name(entry: &str) -> Option<(&str, VolumeDims)> {
    let name = entry.rsplit(['/', '\\']).next().unwrap_or(entry);

    // Walk backwards: digits, 'x', digits, 'x', digits.
    let mut rest = name;
    let mut dims = [0u32; 3];

    for slot in (0..3).rev() {
        let digits = rest
            .as_bytes()
            .iter()
            .rev()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }

        let split = rest.len() - digits;
        dims[slot] = rest[split..].parse().ok()?;
        rest = &rest[..split];

        if slot > 0 {
            rest = rest.strip_suffix(['x', 'X'])?;
        }
    }

    if dims.iter().any(|&d| d == 0) {
        return None;
    }

    Some((
        rest,
        VolumeDims {
            width: dims[0],
            height: dims[1],
            depth: dims[2],
        },
    ))
}

/// Reads the first volume entry out of an in-memory zip archive.
pub fn read_bytes(bytes: &[u8]) -> io::Result<Volume> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| bad(&format!("not a readable zip archive: {e}")))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| bad(&format!("zip entry {index}: {e}")))?;

        let Some((tag, dims)) = parse_entry_name(entry.name()) else {
            continue;
        };
        let tag = tag.to_owned();

        let expect = dims
            .sample_count()
            .ok_or_else(|| bad("volume dimensions overflow"))?;

        let mut voxels = Vec::with_capacity(expect);
        entry.read_to_end(&mut voxels)?;

        return Volume::new(tag, dims, voxels);
    }

    Err(bad("archive has no entry named like <tag><W>x<H>x<D>"))
}

/// Reads a volume archive from disk (single read, then in-memory inflate).
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Volume> {
    let bytes = std::fs::read(path)?;
    read_bytes(&bytes)
}

/// Serializes a volume into an in-memory zip archive under its canonical
/// entry name.
pub fn write_bytes(volume: &Volume) -> io::Result<Vec<u8>> {
    let expect = volume
        .dims
        .sample_count()
        .ok_or_else(|| bad("volume dimensions overflow"))?;
    if volume.voxels.len() != expect {
        return Err(bad("voxel payload does not match dimensions"));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(volume.entry_name(), options)
        .map_err(|e| bad(&format!("zip write: {e}")))?;
    writer.write_all(&volume.voxels)?;

    let cursor = writer
        .finish()
        .map_err(|e| bad(&format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

/// Writes a volume archive to disk.
pub fn write_file<P: AsRef<Path>>(path: P, volume: &Volume) -> io::Result<()> {
    let bytes = write_bytes(volume)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32, d: u32) -> VolumeDims {
        VolumeDims {
            width: w,
            height: h,
            depth: d,
        }
    }

    #[test]
    fn entry_name_parses_tag_and_dims() {
        let (tag, d) = parse_entry_name("head256x256x109").unwrap();
        assert_eq!(tag, "head");
        assert_eq!(d, dims(256, 256, 109));
    }

    #[test]
    fn entry_name_ignores_directory_prefix() {
        let (tag, d) = parse_entry_name("volumes/2024/head256x256x109").unwrap();
        assert_eq!(tag, "head");
        assert_eq!(d, dims(256, 256, 109));
    }

    #[test]
    fn entry_name_rejects_garbage() {
        assert!(parse_entry_name("readme.txt").is_none());
        assert!(parse_entry_name("head256x256").is_none());
        assert!(parse_entry_name("head256x0x109").is_none());
        assert!(parse_entry_name("").is_none());
    }

    #[test]
    fn entry_name_allows_empty_tag() {
        let (tag, d) = parse_entry_name("4x4x2").unwrap();
        assert_eq!(tag, "");
        assert_eq!(d, dims(4, 4, 2));
    }

    #[test]
    fn volume_rejects_wrong_payload_length() {
        let err = Volume::new("head", dims(2, 2, 2), vec![0; 7]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn write_then_read_round_trips() {
        let voxels: Vec<u8> = (0..(4 * 4 * 3)).map(|i| i as u8).collect();
        let volume = Volume::new("probe", dims(4, 4, 3), voxels.clone()).unwrap();

        let bytes = write_bytes(&volume).unwrap();
        let back = read_bytes(&bytes).unwrap();

        assert_eq!(back.name, "probe");
        assert_eq!(back.dims, dims(4, 4, 3));
        assert_eq!(back.voxels, voxels);
    }

    #[test]
    fn read_rejects_truncated_payload() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("head2x2x2", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&[1, 2, 3]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn read_rejects_archive_without_volume_entry() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("notes.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"nothing here").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn slice_accessor_addresses_z_planes() {
        let voxels: Vec<u8> = (0..8).collect();
        let volume = Volume::new("v", dims(2, 2, 2), voxels).unwrap();

        assert_eq!(volume.slice(0).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(volume.slice(1).unwrap(), &[4, 5, 6, 7]);
        assert!(volume.slice(2).is_none());
    }
}
