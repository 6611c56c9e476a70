pub mod file_names;
pub mod prompts;

pub use file_names::*;
pub use prompts::*;
