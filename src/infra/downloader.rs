// ============================================================
// Layer 6 — Downloader
// ============================================================
// Fetches remote files (dataset archive, pretrained weights)
// over HTTP and unpacks zip archives.
//
// Downloads go to a `.part` file first and are renamed into
// place only once complete, so an interrupted download never
// looks like a finished one on the next run.

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Download `url` to `dest` unless `dest` already exists.
/// Returns the destination path.
pub fn download_file(url: &str, dest: &Path) -> Result<PathBuf> {
    if dest.exists() {
        tracing::debug!("'{}' already present, skipping download", dest.display());
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }

    tracing::info!("Downloading {} → {}", url, dest.display());

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Request to '{url}' failed"))?;

    let part = dest.with_extension("part");
    let file = File::create(&part)
        .with_context(|| format!("Cannot create '{}'", part.display()))?;
    let mut writer = BufWriter::new(file);

    let bytes = response
        .copy_to(&mut writer)
        .with_context(|| format!("Download of '{url}' was interrupted"))?;
    writer
        .flush()
        .with_context(|| format!("Cannot write '{}'", part.display()))?;
    drop(writer);

    fs::rename(&part, dest)
        .with_context(|| format!("Cannot move '{}' into place", part.display()))?;

    tracing::info!("Downloaded {} bytes", bytes);
    Ok(dest.to_path_buf())
}

/// Extract every entry of a zip archive below `dest_dir`.
/// Entries whose path would escape `dest_dir` are skipped.
/// Returns the number of files written.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("Cannot open archive '{}'", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("'{}' is not a valid zip archive", archive_path.display()))?;

    let mut extracted = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Cannot read entry {i} of '{}'", archive_path.display()))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry '{}'", entry.name());
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Cannot create '{}'", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("Cannot extract '{}'", out_path.display()))?;
        extracted += 1;
    }

    tracing::debug!(
        "Extracted {} files from '{}'",
        extracted,
        archive_path.display()
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extracts_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("data.zip");
        write_archive(
            &archive,
            &[("set/train/ants/a.txt", b"a"), ("set/val/bees/b.txt", b"bb")],
        );

        let out = tmp.path().join("out");
        let n = extract_zip(&archive, &out).unwrap();

        assert_eq!(n, 2);
        assert_eq!(fs::read(out.join("set/val/bees/b.txt")).unwrap(), b"bb");
    }

    #[test]
    fn test_skips_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        write_archive(&archive, &[("../escape.txt", b"x"), ("ok.txt", b"y")]);

        let out = tmp.path().join("out");
        let n = extract_zip(&archive, &out).unwrap();

        assert_eq!(n, 1);
        assert!(!tmp.path().join("escape.txt").exists());
        assert!(out.join("ok.txt").exists());
    }

    #[test]
    fn test_existing_file_is_not_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("weights.pth");
        fs::write(&dest, b"cached").unwrap();

        // The URL is never contacted because the file already exists
        let path = download_file("http://invalid.localhost/none", &dest).unwrap();
        assert_eq!(path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"cached");
    }
}
