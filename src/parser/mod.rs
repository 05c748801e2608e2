//! Stage 1 building blocks: digest segmentation, header extraction, date
//! normalization and record assembly.

pub mod date;
pub mod header;
pub mod record;
pub mod segment;
