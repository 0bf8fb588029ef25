//! Pure helper utilities

pub mod canonical;
