//! Run output files.
//!
//! # Submodules
//!
//! - [`json`]: writes a locale run's [`RunSummary`](crate::pipeline::RunSummary) as a JSON edition
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── en-US.json
//!     └── de-DE.json
//! ```

pub mod json;
