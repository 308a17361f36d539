// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several other layers:
//
//   checkpoint.rs — params via Burn's CompactRecorder, plus
//                   train_config.json and history.json
//
//   downloader.rs — HTTP downloads (reqwest) and zip extraction,
//                   shared by the dataset and the pretrained
//                   weight import
//
//   metrics.rs    — per-epoch CSV log

/// Model params, run config and history persistence
pub mod checkpoint;

/// HTTP downloads and archive extraction
pub mod downloader;

/// Training metrics CSV logger
pub mod metrics;
