//! Output module for run artifacts
//!
//! This module handles:
//! - The per-slug artifact directory layout
//! - Atomic JSON and text artifact writes
//! - The write-once run summary record
//! - The content policy violations artifact
//! - Rendering a stored run summary for the terminal

mod artifacts;
mod meta;
mod summary;
mod violations;

pub use artifacts::{
    read_json_artifact, write_json_artifact, write_text_artifact, ArtifactLayout, META_FILE,
    VIOLATIONS_FILE,
};
pub use meta::{load_meta, ArtifactIndex, MetaWriter, RunMeta};
pub use summary::{format_run_meta, print_run_meta};
pub use violations::write_violations;
