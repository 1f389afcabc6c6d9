//! Application module

pub mod cli;
pub mod drill;
pub mod startup;
