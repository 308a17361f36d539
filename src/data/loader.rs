// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Scans a directory laid out as one sub-directory per class:
//
//   train/
//     ants/  0013035.jpg  1030023514_aad5c608f9.jpg ...
//     bees/  1092977343_cb42b38d62.jpg ...
//
// Class names are the sub-directory names sorted alphabetically;
// a sample's label is the index of its class in that order.
// Files are found recursively inside each class directory and
// sorted by path so that the sample order is stable.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::domain::{labels::ClassLabels, sample::ImageSample, traits::SampleSource};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

pub struct ImageFolder {
    dir: PathBuf,
    expected: Option<ClassLabels>,
}

impl ImageFolder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expected: None,
        }
    }

    /// Require this folder to contain exactly `classes`.
    /// Used for the validation split so that labels line up with training.
    pub fn with_classes(mut self, classes: ClassLabels) -> Self {
        self.expected = Some(classes);
        self
    }

    fn scan_classes(&self) -> Result<ClassLabels> {
        if !self.dir.is_dir() {
            anyhow::bail!("Image folder '{}' does not exist", self.dir.display());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = entry
                .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }

        let labels = ClassLabels::new(names);
        if labels.is_empty() {
            anyhow::bail!(
                "Image folder '{}' has no class sub-directories",
                self.dir.display()
            );
        }
        Ok(labels)
    }
}

impl SampleSource for ImageFolder {
    fn classes(&self) -> Result<ClassLabels> {
        let found = self.scan_classes()?;
        match &self.expected {
            Some(expected) if expected != &found => anyhow::bail!(
                "Classes in '{}' ({}) do not match the training classes ({})",
                self.dir.display(),
                found.names().join(", "),
                expected.names().join(", "),
            ),
            _ => Ok(found),
        }
    }

    fn load_all(&self) -> Result<Vec<ImageSample>> {
        let classes = self.classes()?;
        let mut samples = Vec::new();

        for (label, name) in classes.names().iter().enumerate() {
            let class_dir = self.dir.join(name);
            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_image_extension(p))
                .collect();
            paths.sort();

            let before = samples.len();
            for path in paths {
                // Only the header is read here; full decoding happens per batch.
                match image::image_dimensions(&path) {
                    Ok(_) => samples.push(ImageSample::new(path, label)),
                    Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
                }
            }
            tracing::debug!("Class '{}': {} images", name, samples.len() - before);
        }

        tracing::info!(
            "Found {} images in {} classes under '{}'",
            samples.len(),
            classes.len(),
            self.dir.display()
        );
        Ok(samples)
    }
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;

    /// Write a tiny solid-colour PNG.
    pub(crate) fn write_png(path: &Path, w: u32, h: u32, colour: [u8; 3]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(w, h, Rgb(colour)).save(path).unwrap();
    }

    #[test]
    fn test_labels_follow_sorted_class_names() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("bees/b1.png"), 4, 4, [255, 255, 0]);
        write_png(&tmp.path().join("ants/a1.png"), 4, 4, [0, 0, 0]);
        write_png(&tmp.path().join("ants/nested/a2.PNG"), 4, 4, [0, 0, 0]);

        let folder = ImageFolder::new(tmp.path());
        let classes = folder.classes().unwrap();
        let samples = folder.load_all().unwrap();

        assert_eq!(classes.names(), &["ants".to_string(), "bees".to_string()]);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples.iter().filter(|s| s.label == 0).count(), 2);
        assert_eq!(samples.iter().filter(|s| s.label == 1).count(), 1);
    }

    #[test]
    fn test_non_images_and_corrupt_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("ants/a1.png"), 4, 4, [0, 0, 0]);
        fs::write(tmp.path().join("ants/readme.txt"), "hi").unwrap();
        fs::write(tmp.path().join("ants/broken.jpg"), "not a jpeg").unwrap();

        let samples = ImageFolder::new(tmp.path()).load_all().unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].path.ends_with("a1.png"));
    }

    #[test]
    fn test_only_visible_subdirectories_are_classes() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("ants/a.png"), 4, 4, [0, 0, 0]);
        write_png(&tmp.path().join(".cache/c.png"), 4, 4, [0, 0, 0]);
        write_png(&tmp.path().join("stray.png"), 4, 4, [0, 0, 0]);

        let classes = ImageFolder::new(tmp.path()).classes().unwrap();
        assert_eq!(classes.names(), &["ants".to_string()]);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ImageFolder::new(tmp.path().join("nope")).load_all().is_err());
    }

    #[test]
    fn test_folder_without_classes_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ImageFolder::new(tmp.path()).classes().is_err());
    }

    #[test]
    fn test_validation_classes_must_match() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("ants/a.png"), 4, 4, [0, 0, 0]);

        let expected = ClassLabels::new(["ants", "bees"]);
        let folder = ImageFolder::new(tmp.path()).with_classes(expected);
        let err = folder.load_all().unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }
}
