//! Directory packing for bundle uploads.

use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::path::Path;
use tar::Builder;
use tracing::debug;
use walkdir::WalkDir;
use zstd::stream::encode_all;

/// zstd compression level for bundle archives.
const COMPRESSION_LEVEL: i32 = 3;

/// File extension produced by [`pack_directory`].
pub const ARCHIVE_EXTENSION: &str = "tar.zst";

/// Pack a directory into a zstd-compressed tar archive.
///
/// Entries are added in sorted path order. Symlinks and special files are
/// skipped; a bundle is a plain file tree.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(anyhow!("not a directory: {}", dir.display()));
    }

    let mut entries: Vec<_> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("failed to walk {}", dir.display()))?;
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut tar_buffer = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_buffer);
        for entry in &entries {
            let path = entry.path();
            let relative = path.strip_prefix(dir)?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            if entry.file_type().is_file() {
                let mut file = File::open(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                builder.append_file(relative, &mut file)?;
            } else if entry.file_type().is_dir() {
                builder.append_dir(relative, path)?;
            } else {
                debug!("skipping non-regular entry: {}", path.display());
            }
        }
        builder.finish()?;
    }

    let compressed = encode_all(&tar_buffer[..], COMPRESSION_LEVEL)
        .context("failed to compress bundle archive")?;
    debug!(
        "packed {}: uncompressed={} bytes, compressed={} bytes",
        dir.display(),
        tar_buffer.len(),
        compressed.len()
    );

    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use zstd::stream::decode_all;

    fn unpack(data: &[u8], target: &Path) {
        let decompressed = decode_all(data).unwrap();
        let mut archive = tar::Archive::new(&decompressed[..]);
        archive.unpack(target).unwrap();
    }

    #[test]
    fn test_pack_directory_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("index.html"), "<html></html>").unwrap();
        let sub = source.join("assets");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("app.js"), "console.log(1)").unwrap();

        let archive = pack_directory(&source).unwrap();

        let target = temp_dir.path().join("target");
        unpack(&archive, &target);
        assert_eq!(
            fs::read_to_string(target.join("index.html")).unwrap(),
            "<html></html>"
        );
        assert_eq!(
            fs::read_to_string(target.join("assets/app.js")).unwrap(),
            "console.log(1)"
        );
    }

    #[test]
    fn test_pack_directory_orders_entries() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("zebra.txt"), "z").unwrap();
        fs::write(source.join("alpha.txt"), "a").unwrap();
        fs::write(source.join("mid.txt"), "m").unwrap();

        let archive = pack_directory(&source).unwrap();

        let decompressed = decode_all(&archive[..]).unwrap();
        let mut tar = tar::Archive::new(&decompressed[..]);
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["alpha.txt", "mid.txt", "zebra.txt"]);
    }

    #[test]
    fn test_pack_rejects_non_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("bundle.js");
        fs::write(&file, "data").unwrap();

        let err = pack_directory(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
