//! `digestnorm` normalizes a plain-text mailing-list digest archive into
//! structured, deduplicated, spam-filtered email records.
//!
//! The work is a three-stage batch pipeline (parse, clean, filter). Each
//! stage writes a complete JSON snapshot into its own directory.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod spam;
