//! Core data model: email records, flags, sender decomposition and stage statistics.

pub mod address;
pub mod email;
pub mod flag;
pub mod stats;
