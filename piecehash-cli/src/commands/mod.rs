//! CLI Commands

pub mod hash;
