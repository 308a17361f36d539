// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe the classification problem:
// which classes exist, which file carries which label, and
// what a prediction looks like.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only structs, enums and traits

// Ordered class names and label lookup
pub mod labels;

// A labelled image file on disk
pub mod sample;

// The result of classifying one image
pub mod prediction;

// Core abstractions that other layers implement
pub mod traits;
