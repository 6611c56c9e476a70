//! Kernel module - infrastructure and dependencies.

pub mod ai;
pub mod arxiv;
pub mod deps;
pub mod http;
pub mod mailer;
pub mod renderer;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use ai::OpenAIBackend;
pub use arxiv::ArxivPaperSource;
pub use deps::DigestDeps;
pub use http::ReqwestFetcher;
pub use mailer::{SmtpMailer, SmtpSettings};
pub use renderer::CommandRenderer;
pub use scheduled_tasks::start_scheduler;
pub use test_dependencies::TestDependencies;
pub use traits::*;
