// ============================================================
// Layer 4 — Image Transforms
// ============================================================
// Turns a decoded image into the normalised CHW float buffer the
// network expects.
//
// Two standard pipelines are provided:
//
//   train: RandomResizedCrop(224) → RandomHorizontalFlip(0.5)
//          → to tensor → normalise
//
//   eval:  Resize(256) → CenterCrop(224) → to tensor → normalise
//
// Normalisation uses the ImageNet channel statistics, which is
// what the pretrained weights were trained with.
//
// All randomness comes from the caller's RNG so that tests can
// pass a seeded generator.

use image::{imageops::FilterType, DynamicImage};
use rand::Rng;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const CROP_ATTEMPTS: usize = 10;

/// One geometric step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Crop a random region (area fraction in `scale`, aspect ratio in
    /// `ratio`) and resize it to `size`×`size`.
    RandomResizedCrop {
        size: u32,
        scale: (f64, f64),
        ratio: (f64, f64),
    },

    /// Mirror left/right with probability `p`.
    RandomHorizontalFlip { p: f64 },

    /// Resize so that the shorter side equals `shorter`, keeping the aspect ratio.
    Resize { shorter: u32 },

    /// Cut the central `size`×`size` region.
    CenterCrop { size: u32 },
}

impl Transform {
    pub fn random_resized_crop(size: u32) -> Self {
        Self::RandomResizedCrop {
            size,
            scale: (0.08, 1.0),
            ratio: (3.0 / 4.0, 4.0 / 3.0),
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        match *self {
            Transform::RandomResizedCrop { size, scale, ratio } => {
                let (x, y, w, h) = crop_params(img.width(), img.height(), scale, ratio, rng);
                img.crop_imm(x, y, w, h)
                    .resize_exact(size, size, FilterType::Triangle)
            }
            Transform::RandomHorizontalFlip { p } => {
                if rng.gen_bool(p.clamp(0.0, 1.0)) {
                    img.fliph()
                } else {
                    img
                }
            }
            Transform::Resize { shorter } => resize_shorter(img, shorter),
            Transform::CenterCrop { size } => center_crop(img, size),
        }
    }
}

/// Pick the region for RandomResizedCrop: `(x, y, width, height)`.
///
/// Tries a random area/aspect ratio a few times; when no attempt fits
/// inside the image it falls back to a centre crop whose aspect ratio
/// is clamped to `ratio`.
pub fn crop_params<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    scale: (f64, f64),
    ratio: (f64, f64),
    rng: &mut R,
) -> (u32, u32, u32, u32) {
    let area = (width as f64) * (height as f64);
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());

    for _ in 0..CROP_ATTEMPTS {
        let target_area = area * rng.gen_range(scale.0..=scale.1);
        let aspect = rng.gen_range(log_lo..=log_hi).exp();

        let w = (target_area * aspect).sqrt().round() as u32;
        let h = (target_area / aspect).sqrt().round() as u32;

        if w > 0 && h > 0 && w <= width && h <= height {
            let x = rng.gen_range(0..=width - w);
            let y = rng.gen_range(0..=height - h);
            return (x, y, w, h);
        }
    }

    // Fallback: central crop with the aspect ratio clamped into range
    let in_ratio = width as f64 / height as f64;
    let (w, h) = if in_ratio < ratio.0 {
        (width, ((width as f64) / ratio.0).round() as u32)
    } else if in_ratio > ratio.1 {
        (((height as f64) * ratio.1).round() as u32, height)
    } else {
        (width, height)
    };
    let (w, h) = (w.clamp(1, width.max(1)), h.clamp(1, height.max(1)));
    ((width - w) / 2, (height - h) / 2, w, h)
}

/// Resize so the shorter side becomes `shorter`.
pub fn resize_shorter(img: DynamicImage, shorter: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 || w.min(h) == shorter {
        return img;
    }
    let (nw, nh) = if w <= h {
        (shorter, ((shorter as u64 * h as u64) / w as u64) as u32)
    } else {
        (((shorter as u64 * w as u64) / h as u64) as u32, shorter)
    };
    img.resize_exact(nw.max(1), nh.max(1), FilterType::Triangle)
}

/// Take the central `size`×`size` region. Images smaller than `size`
/// are first scaled up so the crop always has the requested shape.
pub fn center_crop(img: DynamicImage, size: u32) -> DynamicImage {
    let img = if img.width() < size || img.height() < size {
        resize_shorter(img, size)
    } else {
        img
    };
    let x = ((img.width() - size) as f64 / 2.0).round() as u32;
    let y = ((img.height() - size) as f64 / 2.0).round() as u32;
    img.crop_imm(x, y, size, size)
}

/// Per-channel normalisation applied after scaling pixels into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// A normalised image in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub data: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

impl Normalize {
    /// RGB image → CHW floats, `(pixel / 255 - mean) / std` per channel.
    pub fn to_chw(&self, img: &DynamicImage) -> PixelBuffer {
        let rgb = img.to_rgb8();
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let plane = w * h;
        let mut data = vec![0f32; 3 * plane];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                let v = pixel.0[c] as f32 / 255.0;
                data[c * plane + offset] = (v - self.mean[c]) / self.std[c];
            }
        }

        PixelBuffer {
            data,
            height: h,
            width: w,
        }
    }
}

/// An ordered list of transforms followed by normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePipeline {
    steps: Vec<Transform>,
    normalize: Normalize,
}

impl ImagePipeline {
    pub fn new(steps: Vec<Transform>) -> Self {
        Self {
            steps,
            normalize: Normalize::default(),
        }
    }

    /// Augmenting pipeline used while training.
    pub fn train(size: u32) -> Self {
        Self::new(vec![
            Transform::random_resized_crop(size),
            Transform::RandomHorizontalFlip { p: 0.5 },
        ])
    }

    /// Deterministic pipeline used for validation and prediction.
    pub fn eval(resize: u32, size: u32) -> Self {
        Self::new(vec![
            Transform::Resize { shorter: resize },
            Transform::CenterCrop { size },
        ])
    }

    pub fn run<R: Rng + ?Sized>(&self, img: DynamicImage, rng: &mut R) -> PixelBuffer {
        let img = self
            .steps
            .iter()
            .fold(img, |img, step| step.apply(img, rng));
        self.normalize.to_chw(&img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::{rngs::StdRng, SeedableRng};

    fn solid(w: u32, h: u32, colour: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(colour)))
    }

    #[test]
    fn test_crop_params_stay_inside_image() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let (x, y, w, h) = crop_params(500, 333, (0.08, 1.0), (0.75, 4.0 / 3.0), &mut rng);
            assert!(w > 0 && h > 0);
            assert!(x + w <= 500);
            assert!(y + h <= 333);
        }
    }

    #[test]
    fn test_crop_params_fallback_clamps_ratio() {
        // A scale above 1 can never fit, so the centre fallback is used
        let mut rng = StdRng::seed_from_u64(1);
        let (x, y, w, h) = crop_params(400, 100, (2.0, 3.0), (0.75, 4.0 / 3.0), &mut rng);
        assert_eq!((w, h), (133, 100));
        assert_eq!((x, y), (133, 0));
    }

    #[test]
    fn test_resize_shorter_keeps_aspect() {
        let img = resize_shorter(solid(500, 375, [0, 0, 0]), 256);
        assert_eq!((img.width(), img.height()), (341, 256));

        let tall = resize_shorter(solid(300, 600, [0, 0, 0]), 256);
        assert_eq!((tall.width(), tall.height()), (256, 512));
    }

    #[test]
    fn test_center_crop_is_square() {
        let img = center_crop(solid(341, 256, [0, 0, 0]), 224);
        assert_eq!((img.width(), img.height()), (224, 224));
    }

    #[test]
    fn test_center_crop_upscales_small_images() {
        let img = center_crop(solid(50, 80, [0, 0, 0]), 64);
        assert_eq!((img.width(), img.height()), (64, 64));
    }

    #[test]
    fn test_normalize_values_and_layout() {
        let img = solid(2, 3, [255, 0, 128]);
        let buf = Normalize::default().to_chw(&img);

        assert_eq!(buf.data.len(), 3 * 2 * 3);
        assert_eq!((buf.height, buf.width), (3, 2));

        let r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((buf.data[0] - r).abs() < 1e-5);
        assert!((buf.data[6] - g).abs() < 1e-5);
    }

    #[test]
    fn test_train_pipeline_output_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let pipeline = ImagePipeline::train(32);
        let buf = pipeline.run(solid(120, 90, [10, 20, 30]), &mut rng);
        assert_eq!((buf.height, buf.width), (32, 32));
        assert_eq!(buf.data.len(), 3 * 32 * 32);
    }

    #[test]
    fn test_eval_pipeline_is_deterministic() {
        let pipeline = ImagePipeline::eval(40, 32);
        let mut img = RgbImage::new(64, 48);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 4) as u8, (y * 5) as u8, 7]);
        }
        let img = DynamicImage::ImageRgb8(img);

        let a = pipeline.run(img.clone(), &mut StdRng::seed_from_u64(1));
        let b = pipeline.run(img, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_flip_probability_extremes() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        let img = DynamicImage::ImageRgb8(img);
        let mut rng = StdRng::seed_from_u64(0);

        let kept = Transform::RandomHorizontalFlip { p: 0.0 }.apply(img.clone(), &mut rng);
        let flipped = Transform::RandomHorizontalFlip { p: 1.0 }.apply(img, &mut rng);

        assert_eq!(kept.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flipped.to_rgb8().get_pixel(1, 0).0, [255, 255, 255]);
    }
}
