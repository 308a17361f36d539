// ============================================================
// Layer 4 — Image Folder Dataset
// ============================================================
// Burn `Dataset` over labelled image files. Each `get` decodes the
// file and runs it through the pipeline, so nothing is cached in
// memory between epochs.

use burn::data::dataset::Dataset;
use std::sync::Arc;

use crate::data::transform::{ImagePipeline, PixelBuffer};
use crate::domain::sample::ImageSample;

/// One decoded, transformed and normalised image with its label.
/// `pixels` is CHW with 3 channels.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub pixels: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub label: usize,
}

impl ImageItem {
    pub fn from_buffer(buf: PixelBuffer, label: usize) -> Self {
        Self {
            pixels: buf.data,
            height: buf.height,
            width: buf.width,
            label,
        }
    }
}

/// Image files on disk, decoded and transformed lazily on `get`.
///
/// Random transforms draw from the thread RNG, so each epoch sees
/// a different augmentation of the same file.
pub struct ImageFolderDataset {
    samples: Vec<ImageSample>,
    pipeline: Arc<ImagePipeline>,
}

impl ImageFolderDataset {
    pub fn new(samples: Vec<ImageSample>, pipeline: ImagePipeline) -> Self {
        Self {
            samples,
            pipeline: Arc::new(pipeline),
        }
    }

    fn load(&self, sample: &ImageSample) -> ImageItem {
        let mut rng = rand::thread_rng();
        match image::open(&sample.path) {
            Ok(img) => ImageItem::from_buffer(self.pipeline.run(img, &mut rng), sample.label),
            Err(e) => {
                // Header was valid at scan time; the body is truncated or
                // corrupt. Substitute a blank image of the pipeline's size.
                tracing::error!("Cannot decode '{}': {}", sample.path.display(), e);
                let blank = image::DynamicImage::new_rgb8(1, 1);
                ImageItem::from_buffer(self.pipeline.run(blank, &mut rng), sample.label)
            }
        }
    }
}

impl Dataset<ImageItem> for ImageFolderDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.samples.get(index).map(|s| self.load(s))
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::write_png;
    use std::fs;

    #[test]
    fn test_get_decodes_and_transforms() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ants/a.png");
        write_png(&path, 40, 30, [200, 100, 50]);

        let ds = ImageFolderDataset::new(
            vec![ImageSample::new(&path, 1)],
            ImagePipeline::eval(24, 16),
        );

        let item = ds.get(0).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(item.label, 1);
        assert_eq!((item.height, item.width), (16, 16));
        assert_eq!(item.pixels.len(), 3 * 16 * 16);
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_corrupt_file_yields_blank_item_of_right_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\ntruncated").unwrap();

        let ds = ImageFolderDataset::new(
            vec![ImageSample::new(&path, 0)],
            ImagePipeline::eval(24, 16),
        );
        let item = ds.get(0).unwrap();
        assert_eq!((item.height, item.width), (16, 16));
    }
}
