pub mod classification;
pub mod digest;
pub mod papers;
pub mod reports;
pub mod retrieval;
pub mod summarization;
pub mod usage;
