// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into DigestDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    BaseAI, BaseHtmlRenderer, BaseHttpFetcher, BaseMailer, BasePaperSource, Completion, DigestDeps,
    FetchedBody, TokenUsage,
};
use crate::config::DigestSettings;
use crate::domains::papers::Paper;
use crate::domains::retrieval::{ContentRetriever, HtmlStrategy, PdfStrategy, RetryPolicy};
use crate::domains::usage::UsageLedger;

// =============================================================================
// Mock AI (Generic LLM completion)
// =============================================================================

/// Arguments captured from a completion call
#[derive(Debug, Clone)]
pub struct AiCall {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

enum Reply {
    Text(String),
    Failure(String),
}

pub struct MockAI {
    rules: Arc<Mutex<Vec<(String, Reply)>>>,
    responses: Arc<Mutex<Vec<String>>>,
    usage: TokenUsage,
    calls: Arc<Mutex<Vec<AiCall>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(Vec::new())),
            usage: TokenUsage::new(100, 20),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a text response to the queue
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(response.into());
        self
    }

    /// Reply with `response` whenever the prompt contains `pattern`.
    /// Rules are checked in insertion order before the queue.
    pub fn with_reply_when(self, pattern: &str, response: impl Into<String>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Reply::Text(response.into())));
        self
    }

    /// Fail whenever the prompt contains `pattern`
    pub fn with_failure_when(self, pattern: &str) -> Self {
        self.rules.lock().unwrap().push((
            pattern.to_string(),
            Reply::Failure(format!("mock failure for prompt containing {:?}", pattern)),
        ));
        self
    }

    /// Token usage reported for every call
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Get all calls that were sent to the AI
    pub fn calls(&self) -> Vec<AiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a prompt containing the given text was sent
    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.prompt.contains(text))
    }

    /// Get the number of times the AI was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, prompt: &str, model: &str, temperature: f32) -> Result<Completion> {
        // Record the call
        self.calls.lock().unwrap().push(AiCall {
            prompt: prompt.to_string(),
            model: model.to_string(),
            temperature,
        });

        let text = {
            let rules = self.rules.lock().unwrap();
            match rules.iter().find(|(pattern, _)| prompt.contains(pattern.as_str())) {
                Some((_, Reply::Failure(message))) => return Err(anyhow!(message.clone())),
                Some((_, Reply::Text(text))) => Some(text.clone()),
                None => None,
            }
        };

        let text = text.unwrap_or_else(|| {
            let mut responses = self.responses.lock().unwrap();
            if !responses.is_empty() {
                responses.remove(0)
            } else {
                "Mock AI response".to_string()
            }
        });

        Ok(Completion {
            text,
            usage: self.usage,
        })
    }
}

// =============================================================================
// Mock Mailer
// =============================================================================

/// A message handed to the mailer
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub subject: String,
    pub body: String,
    pub recipients: String,
}

pub struct MockMailer {
    succeed: bool,
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self {
            succeed: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mailer whose deliveries all report failure
    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::new()
        }
    }

    /// Get all attempted deliveries
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMailer for MockMailer {
    async fn deliver(&self, subject: &str, markdown_body: &str, recipients: &str) -> bool {
        self.sent.lock().unwrap().push(SentEmail {
            subject: subject.to_string(),
            body: markdown_body.to_string(),
            recipients: recipients.to_string(),
        });
        self.succeed
    }
}

// =============================================================================
// Mock Paper Source
// =============================================================================

pub struct MockPaperSource {
    papers: Vec<Paper>,
    error: Option<String>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockPaperSource {
    pub fn new() -> Self {
        Self {
            papers: Vec::new(),
            error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_papers(mut self, papers: Vec<Paper>) -> Self {
        self.papers = papers;
        self
    }

    /// Every search fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Category lists passed to each search
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockPaperSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePaperSource for MockPaperSource {
    async fn fetch_papers(&self, categories: &[String], max_results: usize) -> Result<Vec<Paper>> {
        self.calls.lock().unwrap().push(categories.to_vec());

        if let Some(message) = &self.error {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.papers.iter().take(max_results).cloned().collect())
    }
}

// =============================================================================
// Mock HTTP Fetcher
// =============================================================================

pub struct MockHttpFetcher {
    responses: Arc<Mutex<Vec<std::result::Result<FetchedBody, String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockHttpFetcher {
    /// With nothing queued every request answers 404
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue an empty response with the given status
    pub fn with_status(self, status: u16) -> Self {
        self.responses.lock().unwrap().push(Ok(FetchedBody {
            status,
            content_type: None,
            bytes: Vec::new(),
        }));
        self
    }

    /// Queue a 200 response carrying `bytes`
    pub fn with_body(self, bytes: Vec<u8>) -> Self {
        self.responses.lock().unwrap().push(Ok(FetchedBody {
            status: 200,
            content_type: None,
            bytes,
        }));
        self
    }

    /// Queue a transport failure
    pub fn with_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    /// URLs requested, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockHttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseHttpFetcher for MockHttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(FetchedBody {
                status: 404,
                content_type: None,
                bytes: Vec::new(),
            });
        }
        responses.remove(0).map_err(|e| anyhow!(e))
    }
}

// =============================================================================
// Mock HTML Renderer
// =============================================================================

pub struct MockHtmlRenderer {
    output: Option<Vec<u8>>,
    calls: Arc<Mutex<usize>>,
}

impl MockHtmlRenderer {
    /// A renderer that is never available
    pub fn failing() -> Self {
        Self {
            output: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// A renderer that writes `pdf_bytes` to the requested output path
    pub fn succeeding(pdf_bytes: Vec<u8>) -> Self {
        Self {
            output: Some(pdf_bytes),
            ..Self::failing()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl BaseHtmlRenderer for MockHtmlRenderer {
    async fn render_pdf(&self, _html_path: &Path, pdf_path: &Path) -> Result<()> {
        *self.calls.lock().unwrap() += 1;

        match &self.output {
            Some(bytes) => {
                tokio::fs::write(pdf_path, bytes).await?;
                Ok(())
            }
            None => Err(anyhow!("renderer unavailable")),
        }
    }
}

// =============================================================================
// Sample PDF
// =============================================================================

/// Build an uncompressed PDF with one text line per page.
pub fn sample_pdf(pages: &[&str]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub ai: Arc<MockAI>,
    pub papers: Arc<MockPaperSource>,
    pub mailer: Arc<MockMailer>,
    pub fetcher: Arc<MockHttpFetcher>,
    pub renderer: Arc<MockHtmlRenderer>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            ai: Arc::new(MockAI::new()),
            papers: Arc::new(MockPaperSource::new()),
            mailer: Arc::new(MockMailer::new()),
            fetcher: Arc::new(MockHttpFetcher::new()),
            renderer: Arc::new(MockHtmlRenderer::failing()),
        }
    }

    /// Set a mock AI
    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    /// Set a mock paper source
    pub fn mock_papers(mut self, papers: MockPaperSource) -> Self {
        self.papers = Arc::new(papers);
        self
    }

    /// Set a mock mailer
    pub fn mock_mailer(mut self, mailer: MockMailer) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    /// Set a mock HTTP fetcher
    pub fn mock_fetcher(mut self, fetcher: MockHttpFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Set a mock HTML renderer
    pub fn mock_renderer(mut self, renderer: MockHtmlRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Build DigestDeps around these mocks.
    ///
    /// PDF downloads are attempted once without backoff so tests stay fast.
    pub fn into_deps(self, ledger: UsageLedger, settings: DigestSettings) -> DigestDeps {
        let policy = RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(0),
            ..RetryPolicy::default()
        };
        let retriever = ContentRetriever::new(vec![
            Box::new(PdfStrategy::new(self.fetcher.clone()).with_policy(policy)),
            Box::new(HtmlStrategy::new(self.fetcher.clone(), self.renderer.clone())),
        ]);

        DigestDeps::new(
            self.ai,
            self.papers,
            self.mailer,
            Arc::new(retriever),
            ledger,
            settings,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
