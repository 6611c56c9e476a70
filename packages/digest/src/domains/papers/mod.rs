pub mod models;

pub use models::{arxiv_id_from_url, published_since, target_date, Paper};
