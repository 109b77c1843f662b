use crate::analysis::metadata::parse_metadata;
use crate::analysis::notes::{create_or_update_note, is_analysis_note, note_template_id};
use crate::analysis::types::{
    AnalysisError, AnalysisResult, AnalysisSettings, BatchProgress, BatchStatus, CostEstimate,
    ExtractionSummary, NotReady,
};
use crate::extract::{TextExtractor, estimate_tokens, format_for_analysis};
use crate::llm::{ChatMessage, ChatRequest, ProviderGateway};
use crate::store::{Document, DocumentStore};
use crate::templates::TemplateStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SYSTEM_PROMPT: &str = "You are a professional academic paper analysis assistant. \
Follow the user's instructions strictly and give accurate, objective and well-structured analysis.";

/// Delay between consecutive documents of a batch
pub const BATCH_PACING: Duration = Duration::from_secs(1);

/// Allowance for the system prompt and the response in cost estimates
pub const COST_OVERHEAD_TOKENS: u64 = 500;

const PROMPT_TOKEN_WARNING: u64 = 30_000;

/// Orchestrates extraction, template resolution and provider calls.
///
/// The engine owns its gateway; callers construct it once and call
/// [`shutdown`](Self::shutdown) when done.
pub struct AnalysisEngine {
    gateway: ProviderGateway,
    extractor: TextExtractor,
    store: Arc<dyn DocumentStore>,
    templates: Arc<dyn TemplateStore>,
    settings: AnalysisSettings,
}

impl AnalysisEngine {
    pub fn new(
        gateway: ProviderGateway,
        store: Arc<dyn DocumentStore>,
        templates: Arc<dyn TemplateStore>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            gateway,
            extractor: TextExtractor::new(Arc::clone(&store)),
            store,
            templates,
            settings,
        }
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut ProviderGateway {
        &mut self.gateway
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Check local configuration only; no request is made.
    pub fn can_start_analysis(&self) -> Result<(), NotReady> {
        let kind = self
            .gateway
            .active_provider()
            .ok_or(NotReady::NoActiveProvider)?;
        if !self.gateway.is_provider_configured(kind) {
            return Err(NotReady::MissingApiKey(kind));
        }
        if self.gateway.default_model(Some(kind)).is_none() {
            return Err(NotReady::NoDefaultModel(kind));
        }
        Ok(())
    }

    /// Analyze one document. Never fails; problems are reported through
    /// [`AnalysisResult::error`].
    pub async fn analyze_one(&mut self, document: &Document, template_id: &str) -> AnalysisResult {
        match self.run_analysis(document, template_id).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis of {} failed: {}", document.id, e);
                let template_name = self
                    .templates
                    .get(template_id)
                    .map(|t| t.name)
                    .unwrap_or_else(|| "Unknown".to_string());
                AnalysisResult::failure(&document.id, template_id, template_name, e.to_string())
            }
        }
    }

    async fn run_analysis(
        &mut self,
        document: &Document,
        template_id: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| AnalysisError::TemplateNotFound(template_id.to_string()))?;

        let extracted = self.extractor.extract(document).await;
        let advisories = extracted.advisories();
        if !advisories.is_empty() {
            warn!("Extraction issues for {}: {}", document.id, advisories.join("; "));
        }

        let formatted = format_for_analysis(&extracted);
        let estimated = estimate_tokens(&formatted);
        debug!("Estimated {} prompt tokens for {}", estimated, document.id);
        if estimated > PROMPT_TOKEN_WARNING {
            warn!(
                "Prompt for {} is about {} tokens and may exceed the model context",
                document.id, estimated
            );
        }

        let kind = self
            .gateway
            .active_provider()
            .ok_or(NotReady::NoActiveProvider)?;
        let model = self
            .gateway
            .default_model(Some(kind))
            .ok_or(NotReady::NoDefaultModel(kind))?
            .to_string();

        let request = ChatRequest::new(
            model,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("{}\n\n{}", template.content, formatted)),
            ],
        )
        .with_temperature(self.settings.temperature)
        .with_max_output_tokens(self.settings.max_output_tokens);

        let response = self.gateway.chat(request, Some(kind)).await?;

        Ok(AnalysisResult {
            document_id: document.id.clone(),
            template_id: template.id,
            template_name: template.name,
            content: response.text,
            model: response.model,
            provider: kind.to_string(),
            timestamp: Utc::now(),
            usage: response.usage,
            error: None,
            advisories,
            extraction: Some(ExtractionSummary::from(&extracted)),
        })
    }

    /// Analyze documents one at a time, pausing [`BATCH_PACING`] between
    /// them. `on_progress` sees every item as `Processing` and then as
    /// `Completed` or `Failed`.
    ///
    /// Item failures stay in their results. Only a failure to persist a note
    /// aborts the batch.
    pub async fn analyze_batch<F>(
        &mut self,
        documents: &[Document],
        template_id: &str,
        mut on_progress: F,
    ) -> Result<Vec<AnalysisResult>, AnalysisError>
    where
        F: FnMut(&BatchProgress),
    {
        let total = documents.len();
        let mut results = Vec::with_capacity(total);
        info!("Starting batch of {} documents with template {}", total, template_id);

        for (index, document) in documents.iter().enumerate() {
            let mut progress = BatchProgress {
                current: index + 1,
                total,
                current_label: document.label().to_string(),
                status: BatchStatus::Processing,
            };
            on_progress(&progress);

            let result = self.analyze_one(document, template_id).await;
            match &result.error {
                Some(e) => {
                    error!("Analysis failed for {}: {}", document.id, e);
                    progress.status = BatchStatus::Failed;
                }
                None => {
                    if self.settings.auto_create_note {
                        create_or_update_note(self.store.as_ref(), &result).await?;
                    }
                    progress.status = BatchStatus::Completed;
                }
            }
            on_progress(&progress);
            results.push(result);

            if index + 1 < total {
                tokio::time::sleep(BATCH_PACING).await;
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!("Batch finished: {} succeeded, {} failed", total - failed, failed);
        Ok(results)
    }

    /// Rough token budget: extracted text plus template plus a fixed
    /// overhead, per document.
    pub async fn estimate_cost(
        &self,
        documents: &[Document],
        template_id: &str,
    ) -> Result<CostEstimate, AnalysisError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| AnalysisError::TemplateNotFound(template_id.to_string()))?;
        let template_tokens = estimate_tokens(&template.content);

        let mut total_tokens = 0;
        for document in documents {
            let extracted = self.extractor.extract(document).await;
            total_tokens +=
                estimate_tokens(&format_for_analysis(&extracted)) + template_tokens + COST_OVERHEAD_TOKENS;
        }

        let document_count = documents.len();
        let average_tokens = if document_count == 0 {
            0
        } else {
            (total_tokens as f64 / document_count as f64).round() as u64
        };

        Ok(CostEstimate {
            total_tokens,
            document_count,
            average_tokens,
        })
    }

    /// Earlier results rebuilt from the document's analysis notes, newest
    /// first.
    pub async fn get_history(&self, document_id: &str) -> Result<Vec<AnalysisResult>, AnalysisError> {
        let notes = self.store.notes(document_id).await?;

        let mut results: Vec<AnalysisResult> = notes
            .into_iter()
            .filter(is_analysis_note)
            .map(|note| {
                let metadata = parse_metadata(&note.content).unwrap_or_default();
                let template_id = metadata
                    .template_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .or_else(|| note_template_id(&note).map(str::to_string))
                    .unwrap_or_default();
                let template_name = if !metadata.template_name.is_empty() {
                    metadata.template_name.clone()
                } else if !template_id.is_empty() {
                    template_id.clone()
                } else {
                    "Unknown".to_string()
                };

                AnalysisResult {
                    document_id: document_id.to_string(),
                    template_id,
                    template_name,
                    timestamp: metadata.timestamp().unwrap_or(note.date_modified),
                    model: metadata.model,
                    provider: metadata.provider,
                    usage: metadata.token_usage.map(Into::into),
                    extraction: metadata.extraction,
                    content: note.content,
                    error: None,
                    advisories: Vec::new(),
                }
            })
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(results)
    }

    /// Release provider clients.
    pub async fn shutdown(&mut self) {
        self.gateway.shutdown().await;
        info!("Analysis engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::notes::ANALYSIS_TAG;
    use crate::llm::{
        ChatResponse, ErrorKind, LLMError, LLMProvider, ModelInfo, ProviderConfig, ProviderKind,
        TokenUsage,
    };
    use crate::store::{JsonLibrary, LibraryEntry, NewNote};
    use crate::templates::TemplateLibrary;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Fails any request whose prompt mentions "poison"; records every
    /// request it sees.
    struct Scripted {
        seen: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl LLMProvider for Scripted {
        fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LLMError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request.clone());
                let prompt = &request.messages[1].content;
                if prompt.contains("poison") {
                    return Err(LLMError::new(ErrorKind::ServerError, "Scripted", "Provider server error (HTTP 500)")
                        .with_status(500));
                }
                Ok(ChatResponse {
                    text: format!("analysis of {} chars", prompt.len()),
                    model: request.model,
                    finish_reason: Some("stop".to_string()),
                    usage: Some(TokenUsage::new(100, 20)),
                })
            })
        }

        fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelInfo>, LLMError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn validate_api_key(&self) -> BoxFuture<'_, Result<bool, LLMError>> {
            Box::pin(async { Ok(true) })
        }

        fn provider_name(&self) -> &'static str {
            "Scripted"
        }
    }

    fn scripted_gateway(seen: Arc<Mutex<Vec<ChatRequest>>>) -> ProviderGateway {
        let mut gateway = ProviderGateway::with_factory(Arc::new(move |_: &ProviderConfig| {
            Ok(Arc::new(Scripted { seen: seen.clone() }) as Arc<dyn LLMProvider>)
        }));
        gateway.add_or_update_provider(
            ProviderConfig::new(ProviderKind::OpenAI, "sk-test").with_default_model("gpt-4"),
        );
        gateway.set_active(ProviderKind::OpenAI).unwrap();
        gateway
    }

    fn documents() -> Vec<Document> {
        let mut poisoned = Document::new("doc-2", "Second paper");
        poisoned.abstract_note = Some("poison".to_string());
        vec![
            Document::new("doc-1", "First paper"),
            poisoned,
            Document::new("doc-3", "Third paper"),
        ]
    }

    fn engine_with(settings: AnalysisSettings) -> (AnalysisEngine, Arc<JsonLibrary>, Arc<Mutex<Vec<ChatRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(JsonLibrary::in_memory(
            documents().into_iter().map(LibraryEntry::new).collect(),
        ));
        let engine = AnalysisEngine::new(
            scripted_gateway(seen.clone()),
            store.clone(),
            Arc::new(TemplateLibrary::new()),
            settings,
        );
        (engine, store, seen)
    }

    fn engine() -> (AnalysisEngine, Arc<JsonLibrary>, Arc<Mutex<Vec<ChatRequest>>>) {
        engine_with(AnalysisSettings::default())
    }

    #[test]
    fn test_can_start_analysis_scenario() {
        let mut engine = AnalysisEngine::new(
            ProviderGateway::new(),
            Arc::new(JsonLibrary::in_memory(Vec::new())),
            Arc::new(TemplateLibrary::new()),
            AnalysisSettings::default(),
        );
        assert_eq!(engine.can_start_analysis(), Err(NotReady::NoActiveProvider));

        engine
            .gateway_mut()
            .add_or_update_provider(ProviderConfig::new(ProviderKind::OpenAI, "sk-valid"));
        engine.gateway_mut().set_active(ProviderKind::OpenAI).unwrap();
        assert_eq!(
            engine.can_start_analysis(),
            Err(NotReady::NoDefaultModel(ProviderKind::OpenAI))
        );

        engine
            .gateway_mut()
            .set_default_model(ProviderKind::OpenAI, "gpt-4")
            .unwrap();
        assert_eq!(engine.can_start_analysis(), Ok(()));

        engine.gateway_mut().remove_provider(ProviderKind::OpenAI);
        assert_eq!(engine.can_start_analysis(), Err(NotReady::NoActiveProvider));
    }

    #[test]
    fn test_missing_api_key_reported() {
        let mut gateway = ProviderGateway::new();
        gateway.add_or_update_provider(ProviderConfig::new(ProviderKind::DeepSeek, "").with_default_model("deepseek-chat"));
        gateway.set_active(ProviderKind::DeepSeek).unwrap();
        let engine = AnalysisEngine::new(
            gateway,
            Arc::new(JsonLibrary::in_memory(Vec::new())),
            Arc::new(TemplateLibrary::new()),
            AnalysisSettings::default(),
        );
        assert_eq!(
            engine.can_start_analysis(),
            Err(NotReady::MissingApiKey(ProviderKind::DeepSeek))
        );
    }

    #[tokio::test]
    async fn test_analyze_one_builds_prompt() {
        let (mut engine, _, seen) = engine();
        let result = engine.analyze_one(&documents()[0], "summary").await;

        assert!(result.is_success());
        assert_eq!(result.template_name, "Paper summary");
        assert_eq!(result.model, "gpt-4");
        assert_eq!(result.provider, "openai");
        assert_eq!(result.usage.unwrap().total_tokens, 120);
        // metadata only: the missing attachments are advisory
        assert!(result.advisories.iter().any(|a| a == "No attachments found"));

        let requests = seen.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert!(request.messages[1].content.starts_with("Summarize the core content"));
        assert!(request.messages[1].content.contains("**Title**: First paper"));
        assert_eq!(request.max_output_tokens, Some(4000));
    }

    #[tokio::test]
    async fn test_analyze_one_failures_are_results() {
        let (mut engine, _, _) = engine();

        let missing = engine.analyze_one(&documents()[0], "no-such-template").await;
        assert_eq!(missing.template_name, "Unknown");
        assert!(missing.error.unwrap().contains("Template not found"));

        let failed = engine.analyze_one(&documents()[1], "summary").await;
        assert_eq!(failed.template_name, "Paper summary");
        assert!(failed.content.is_empty());
        assert!(failed.error.unwrap().contains("HTTP 500"));

        engine.gateway_mut().remove_provider(ProviderKind::OpenAI);
        let unconfigured = engine.analyze_one(&documents()[0], "summary").await;
        assert!(unconfigured.error.unwrap().contains("No LLM provider"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_isolates_failures_and_paces() {
        let (mut engine, store, _) = engine();
        let mut events = Vec::new();

        let start = tokio::time::Instant::now();
        let results = engine
            .analyze_batch(&documents(), "summary", |p| events.push((p.current, p.status)))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());

        // two pauses for three documents
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));

        assert_eq!(
            events,
            vec![
                (1, BatchStatus::Processing),
                (1, BatchStatus::Completed),
                (2, BatchStatus::Processing),
                (2, BatchStatus::Failed),
                (3, BatchStatus::Processing),
                (3, BatchStatus::Completed),
            ]
        );

        // notes only for successful items
        assert_eq!(store.notes("doc-1").await.unwrap().len(), 1);
        assert!(store.notes("doc-2").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_item_batch_has_no_pause() {
        let (mut engine, _, _) = engine_with(AnalysisSettings {
            auto_create_note: false,
            ..Default::default()
        });
        let start = tokio::time::Instant::now();
        let results = engine
            .analyze_batch(&documents()[..1], "summary", |_| {})
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(start.elapsed() < BATCH_PACING);
    }

    #[tokio::test]
    async fn test_note_persistence_failure_aborts_batch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        // documents exist for extraction but not in the store, so saving fails
        let mut engine = AnalysisEngine::new(
            scripted_gateway(seen.clone()),
            Arc::new(JsonLibrary::in_memory(Vec::new())),
            Arc::new(TemplateLibrary::new()),
            AnalysisSettings::default(),
        );

        let result = engine.analyze_batch(&documents(), "summary", |_| {}).await;
        assert!(matches!(result, Err(AnalysisError::Store(_))));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_estimate_cost() {
        let (engine, _, _) = engine();
        let docs = documents();

        let estimate = engine.estimate_cost(&docs, "summary").await.unwrap();
        assert_eq!(estimate.document_count, 3);
        assert!(estimate.total_tokens > 3 * COST_OVERHEAD_TOKENS);
        let expected_average = (estimate.total_tokens as f64 / 3.0).round() as u64;
        assert_eq!(estimate.average_tokens, expected_average);

        let empty = engine.estimate_cost(&[], "summary").await.unwrap();
        assert_eq!(empty, CostEstimate::default());

        assert!(matches!(
            engine.estimate_cost(&docs, "missing").await,
            Err(AnalysisError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (mut engine, store, _) = engine();
        engine
            .analyze_batch(&documents()[..1], "summary", |_| {})
            .await
            .unwrap();

        let legacy = "<p>old</p>\n- **使用模型**: qwen-max\n- **提供商**: aliyun\n- **提示词**: 论文总结";
        store
            .save_note(
                "doc-1",
                NewNote {
                    content: legacy.to_string(),
                    tags: vec![ANALYSIS_TAG.to_string(), "prompt:summary".to_string()],
                },
            )
            .await
            .unwrap();
        store
            .save_note(
                "doc-1",
                NewNote {
                    content: "reading notes".to_string(),
                    tags: vec!["todo".to_string()],
                },
            )
            .await
            .unwrap();

        let history = engine.get_history("doc-1").await.unwrap();
        assert_eq!(history.len(), 2);
        // the legacy note has no timestamp and falls back to its save time
        assert_eq!(history[0].model, "qwen-max");
        assert_eq!(history[0].template_id, "summary");
        assert_eq!(history[0].template_name, "论文总结");
        assert_eq!(history[1].model, "gpt-4");
        assert_eq!(history[1].provider, "openai");
        assert_eq!(history[1].usage.unwrap().total_tokens, 120);
        assert!(history[0].timestamp >= history[1].timestamp);

        assert!(engine.get_history("unknown").await.unwrap().is_empty());
    }
}
