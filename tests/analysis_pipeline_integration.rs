//! End-to-end analysis: a JSON library on disk, a mock OpenAI-compatible
//! server, and the engine writing notes back to the library file.

use aipa::analysis::{ANALYSIS_TAG, parse_metadata};
use aipa::extract::ExtractionErrorKind;
use aipa::store::{Attachment, AttachmentLinkMode, Creator, LibraryEntry, LibraryFile};
use aipa::{
    AnalysisEngine, AnalysisSettings, BatchStatus, Document, DocumentStore, JsonLibrary,
    ProviderConfig, ProviderGateway, ProviderKind, TemplateLibrary, TextExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAPER_TEXT: &str = "Transformers replace recurrence with attention.\n\n\n\nResults improve BLEU.";

fn write_library(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir.join("files")).unwrap();
    std::fs::write(dir.join("files/paper.pdf"), PAPER_TEXT).unwrap();

    let mut paper = Document::new("doc-1", "Attention Is All You Need");
    paper.creators = vec![Creator::new("Ashish", "Vaswani")];
    paper.date = Some("June 2017".to_string());
    paper.abstract_note = Some("The dominant sequence transduction models...".to_string());

    let mut missing = Document::new("doc-2", "Missing PDF");
    missing.abstract_note = Some("Only an abstract here.".to_string());

    let file = LibraryFile {
        documents: vec![
            LibraryEntry::new(paper).with_attachment(
                Attachment::pdf("att-1", AttachmentLinkMode::ImportedFile),
                Some(PathBuf::from("files/paper.pdf")),
            ),
            LibraryEntry::new(missing).with_attachment(
                Attachment::pdf("att-2", AttachmentLinkMode::LinkedFile),
                Some(PathBuf::from("files/gone.pdf")),
            ),
        ],
    };

    let library_path = dir.join("library.json");
    std::fs::write(&library_path, serde_json::to_string_pretty(&file).unwrap()).unwrap();
    library_path
}

fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "gpt-4-0613",
        "choices": [{
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150 }
    })
}

fn gateway(server: &MockServer) -> ProviderGateway {
    let mut gateway = ProviderGateway::new();
    gateway.add_or_update_provider(
        ProviderConfig::new(ProviderKind::OpenAI, "sk-test")
            .with_base_url(server.uri())
            .with_default_model("gpt-4")
            .with_max_retries(0),
    );
    gateway.set_active(ProviderKind::OpenAI).unwrap();
    gateway
}

#[tokio::test]
async fn test_extraction_reads_file_and_reports_missing_link() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(JsonLibrary::open(write_library(temp_dir.path())).await.unwrap());
    let extractor = TextExtractor::new(library.clone());

    let paper = library.document("doc-1").await.unwrap().unwrap();
    let extracted = extractor.extract(&paper).await;
    assert!(extracted.success());
    assert_eq!(extracted.year, "2017");
    assert_eq!(extracted.authors, "Ashish Vaswani");
    assert!(extracted.full_text.unwrap().contains("Results improve BLEU."));

    let missing = library.document("doc-2").await.unwrap().unwrap();
    let extracted = extractor.extract(&missing).await;
    assert!(!extracted.success());
    assert!(
        extracted
            .extraction_status
            .has_error(ExtractionErrorKind::LinkedFileUnavailable)
    );
    assert!(!extracted.advisories().is_empty());
}

#[tokio::test]
async fn test_batch_writes_notes_to_library_file() {
    let temp_dir = TempDir::new().unwrap();
    let library_path = write_library(temp_dir.path());
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Attention Is All You Need"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A concise summary.")))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Missing PDF"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Abstract-only summary.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let library = Arc::new(JsonLibrary::open(&library_path).await.unwrap());
    let mut engine = AnalysisEngine::new(
        gateway(&mock_server),
        library.clone(),
        Arc::new(TemplateLibrary::new()),
        AnalysisSettings::default(),
    );
    engine.can_start_analysis().unwrap();

    let documents = library.documents().await.unwrap();
    let mut statuses = Vec::new();
    let results = engine
        .analyze_batch(&documents, "summary", |p| statuses.push((p.current, p.status)))
        .await
        .unwrap();

    assert_eq!(
        statuses,
        vec![
            (1, BatchStatus::Processing),
            (1, BatchStatus::Completed),
            (2, BatchStatus::Processing),
            (2, BatchStatus::Completed),
        ]
    );
    assert_eq!(results[0].content, "A concise summary.");
    assert_eq!(results[0].provider, "openai");
    assert_eq!(results[0].usage.unwrap().total_tokens, 150);
    assert!(results[0].advisories.is_empty());
    assert!(!results[1].advisories.is_empty());

    // A fresh handle sees the notes the engine persisted.
    let reopened = JsonLibrary::open(&library_path).await.unwrap();
    let notes = reopened.notes("doc-1").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].has_tag(ANALYSIS_TAG));
    assert!(notes[0].content.contains("A concise summary."));

    let metadata = parse_metadata(&notes[0].content).unwrap();
    assert_eq!(metadata.model, "gpt-4-0613");
    assert_eq!(metadata.provider, "openai");
    assert_eq!(metadata.template_id.as_deref(), Some("summary"));

    let history = engine.get_history("doc-1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].template_id, "summary");
    assert_eq!(history[0].usage.unwrap().total_tokens, 150);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_reanalysis_replaces_note() {
    let temp_dir = TempDir::new().unwrap();
    let library_path = write_library(temp_dir.path());
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Summary text.")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let library = Arc::new(JsonLibrary::open(&library_path).await.unwrap());
    let mut engine = AnalysisEngine::new(
        gateway(&mock_server),
        library.clone(),
        Arc::new(TemplateLibrary::new()),
        AnalysisSettings::default(),
    );

    let paper = library.document("doc-1").await.unwrap().unwrap();
    for _ in 0..2 {
        let results = engine
            .analyze_batch(std::slice::from_ref(&paper), "summary", |_| {})
            .await
            .unwrap();
        assert!(results[0].is_success());
    }

    assert_eq!(library.notes("doc-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_failure_leaves_library_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let library_path = write_library(temp_dir.path());
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let library = Arc::new(JsonLibrary::open(&library_path).await.unwrap());
    let mut engine = AnalysisEngine::new(
        gateway(&mock_server),
        library.clone(),
        Arc::new(TemplateLibrary::new()),
        AnalysisSettings::default(),
    );

    let paper = library.document("doc-1").await.unwrap().unwrap();
    let results = engine
        .analyze_batch(std::slice::from_ref(&paper), "summary", |_| {})
        .await
        .unwrap();

    assert!(results[0].error.as_deref().unwrap().contains("Invalid API key"));
    assert!(library.notes("doc-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_estimate_counts_extracted_text() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(JsonLibrary::open(write_library(temp_dir.path())).await.unwrap());
    let engine = AnalysisEngine::new(
        ProviderGateway::new(),
        library.clone(),
        Arc::new(TemplateLibrary::new()),
        AnalysisSettings::default(),
    );

    let documents = library.documents().await.unwrap();
    let estimate = engine.estimate_cost(&documents, "summary").await.unwrap();
    assert_eq!(estimate.document_count, 2);
    assert!(estimate.total_tokens > 2 * aipa::analysis::COST_OVERHEAD_TOKENS);
    assert_eq!(
        estimate.average_tokens,
        (estimate.total_tokens as f64 / 2.0).round() as u64
    );
}
