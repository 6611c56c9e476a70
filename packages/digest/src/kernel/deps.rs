//! Digest dependencies for activities (using traits for testability)
//!
//! Every external service sits behind a `Base*` trait so tests can swap in
//! the mocks from `test_dependencies`.

use std::sync::Arc;

use crate::config::DigestSettings;
use crate::domains::retrieval::ContentRetriever;
use crate::domains::usage::UsageLedger;
use crate::kernel::{BaseAI, BaseMailer, BasePaperSource};

/// Dependencies accessible to digest activities
#[derive(Clone)]
pub struct DigestDeps {
    /// Completion backend shared by the interest filter and the summarizer
    pub ai: Arc<dyn BaseAI>,
    pub papers: Arc<dyn BasePaperSource>,
    pub mailer: Arc<dyn BaseMailer>,
    pub retriever: Arc<ContentRetriever>,
    pub ledger: UsageLedger,
    pub settings: DigestSettings,
}

impl DigestDeps {
    pub fn new(
        ai: Arc<dyn BaseAI>,
        papers: Arc<dyn BasePaperSource>,
        mailer: Arc<dyn BaseMailer>,
        retriever: Arc<ContentRetriever>,
        ledger: UsageLedger,
        settings: DigestSettings,
    ) -> Self {
        Self {
            ai,
            papers,
            mailer,
            retriever,
            ledger,
            settings,
        }
    }
}
