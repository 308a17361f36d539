// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a remote zip archive to tensor batches:
//
//   hymenoptera_data.zip
//       │
//       ▼
//   DatasetDownloader  → fetches and unpacks the archive once
//       │
//       ▼
//   ImageFolder        → class dirs → labelled ImageSamples
//       │
//       ▼
//   ImageFolderDataset → decodes + transforms on demand (Burn Dataset)
//       │
//       ▼
//   ImageBatcher       → stacks items into [N,3,H,W] tensors
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop

/// Downloads and unpacks the image dataset
pub mod download;

/// Scans class sub-directories into labelled samples
pub mod loader;

/// Crops, flips, resizes and normalises images
pub mod transform;

/// Implements Burn's Dataset trait over image files
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle + train/validation split
pub mod splitter;
