// Paper digest library
//
// Fetches new arXiv papers per user, filters them by interest, summarizes
// full text, emails a report, and records token usage.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
