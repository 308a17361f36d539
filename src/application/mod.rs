// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: these use cases tell the data,
// ml and infra layers what to do, in which order, and hand
// the results back to the CLI.
//
//   train_use_case.rs   — dataset → pretrained net → fit
//   predict_use_case.rs — checkpoint → inferencer → predictions

pub mod predict_use_case;
pub mod train_use_case;
