use aipa::analysis::{delete_analysis_notes, export_note_markdown, notes_stats};
use aipa::cli::{AnalyzeConfig, AppConfig, Args, ConfigDiscovery, DocumentSelection, ExecutionMode};
use aipa::env::vars::DEFAULT_LOG_FILTER;
use aipa::{
    AnalysisEngine, BatchStatus, Document, DocumentStore, JsonLibrary, PromptTemplate, ProviderKind,
    TemplateLibrary, TemplateStore,
};
use anyhow::{Context, anyhow};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if let ExecutionMode::ShowConfig = mode {
        ConfigDiscovery::show_discovery_info();
        return Ok(());
    }

    let mut config = ConfigDiscovery::load(args.config.as_deref())?;
    if let Some(library) = args.library.clone() {
        config.library = Some(library);
    }

    match mode {
        ExecutionMode::Analyze(analyze) => run_analyze(config, analyze).await,
        ExecutionMode::Estimate(selection) => run_estimate(config, selection).await,
        ExecutionMode::History { document_id } => run_history(config, &document_id).await,
        ExecutionMode::Models { provider } => run_models(config, provider).await,
        ExecutionMode::TestConnection { provider } => run_test_connection(config, provider).await,
        ExecutionMode::Check => run_check(config).await,
        ExecutionMode::NoteStats { document_id } => run_note_stats(config, &document_id).await,
        ExecutionMode::ExportNote {
            document_id,
            note_id,
            output,
        } => run_export_note(config, &document_id, &note_id, output).await,
        ExecutionMode::DeleteNotes { document_id } => run_delete_notes(config, &document_id).await,
        ExecutionMode::Templates { category, stats } => {
            let templates = load_templates(&config)?;
            if stats {
                show_template_stats(&templates);
            } else {
                show_templates(&templates, category.as_deref());
            }
            Ok(())
        }
        ExecutionMode::ResetTemplates => {
            let mut templates = load_templates(&config)?;
            templates.reset_to_defaults()?;
            println!("Restored {} built-in templates", templates.stats().default);
            Ok(())
        }
        ExecutionMode::ShowConfig => Ok(()),
    }
}

fn load_templates(config: &AppConfig) -> anyhow::Result<TemplateLibrary> {
    match config.templates_path() {
        Some(path) => TemplateLibrary::load(&path)
            .with_context(|| format!("Failed to load templates from {:?}", path)),
        None => Ok(TemplateLibrary::new()),
    }
}

async fn open_library(config: &AppConfig) -> anyhow::Result<Arc<JsonLibrary>> {
    let path = config
        .library_path()
        .ok_or_else(|| anyhow!("No library file configured; pass --library"))?;
    let mut library = JsonLibrary::open(&path)
        .await
        .with_context(|| format!("Failed to open library {:?}", path))?;
    if let Some(dir) = &config.fulltext_dir {
        library = library.with_fulltext_dir(dir);
    }
    Ok(Arc::new(library))
}

async fn build_engine(config: &AppConfig) -> anyhow::Result<(AnalysisEngine, Arc<JsonLibrary>)> {
    let library = open_library(config).await?;
    let templates = load_templates(config)?;
    let engine = AnalysisEngine::new(
        config.to_gateway(),
        library.clone(),
        Arc::new(templates),
        config.analysis.clone(),
    );
    Ok((engine, library))
}

async fn select_documents(
    library: &JsonLibrary,
    selection: &DocumentSelection,
) -> anyhow::Result<Vec<Document>> {
    if selection.all {
        return Ok(library.documents().await?);
    }

    let mut documents = Vec::with_capacity(selection.document_ids.len());
    for id in &selection.document_ids {
        let document = library
            .document(id)
            .await?
            .ok_or_else(|| anyhow!("Unknown document: {}", id))?;
        documents.push(document);
    }
    Ok(documents)
}

async fn run_analyze(mut config: AppConfig, analyze: AnalyzeConfig) -> anyhow::Result<()> {
    if let Some(save_notes) = analyze.save_notes {
        config.analysis.auto_create_note = save_notes;
    }

    let (mut engine, library) = build_engine(&config).await?;
    if let Err(reason) = engine.can_start_analysis() {
        eprintln!("Cannot start analysis: {}", reason);
        std::process::exit(1);
    }

    let documents = select_documents(&library, &analyze.selection).await?;
    info!(
        "Analyzing {} documents with template {}",
        documents.len(),
        analyze.selection.template_id
    );

    let results = engine
        .analyze_batch(&documents, &analyze.selection.template_id, |progress| {
            match progress.status {
                BatchStatus::Processing => println!(
                    "[{}/{}] {}",
                    progress.current, progress.total, progress.current_label
                ),
                BatchStatus::Completed => println!("  ✓ done"),
                BatchStatus::Failed => println!("  ✗ failed"),
                BatchStatus::Pending => {}
            }
        })
        .await?;

    println!();
    for result in &results {
        match &result.error {
            Some(error) => println!("✗ {}: {}", result.document_id, error),
            None => {
                let tokens = result
                    .usage
                    .map(|u| format!(", {} tokens", u.total_tokens))
                    .unwrap_or_default();
                println!("✓ {} ({} via {}{})", result.document_id, result.model, result.provider, tokens);
                for advisory in &result.advisories {
                    println!("    ⚠ {}", advisory);
                }
                if analyze.verbose {
                    println!("\n{}\n", result.content);
                }
            }
        }
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    println!("\n{} succeeded, {} failed", results.len() - failed, failed);

    engine.shutdown().await;
    Ok(())
}

async fn run_estimate(config: AppConfig, selection: DocumentSelection) -> anyhow::Result<()> {
    let (engine, library) = build_engine(&config).await?;
    let documents = select_documents(&library, &selection).await?;
    let estimate = engine.estimate_cost(&documents, &selection.template_id).await?;

    println!("Documents:       {}", estimate.document_count);
    println!("Total tokens:    ~{}", estimate.total_tokens);
    println!("Per document:    ~{}", estimate.average_tokens);
    Ok(())
}

async fn run_history(config: AppConfig, document_id: &str) -> anyhow::Result<()> {
    let (engine, _) = build_engine(&config).await?;
    let history = engine.get_history(document_id).await?;

    if history.is_empty() {
        println!("No analyses found for {}", document_id);
        return Ok(());
    }

    for result in history {
        println!(
            "{}  {}  {} ({})",
            result.timestamp.format("%Y-%m-%d %H:%M"),
            result.template_name,
            if result.model.is_empty() { "unknown model" } else { result.model.as_str() },
            if result.provider.is_empty() { "unknown provider" } else { result.provider.as_str() },
        );
    }
    Ok(())
}

async fn run_models(config: AppConfig, provider: Option<ProviderKind>) -> anyhow::Result<()> {
    let mut gateway = config.to_gateway();
    let models = gateway.list_models(provider).await?;
    for model in models {
        println!("{:<40} {:>8} tokens", model.id, model.max_tokens);
    }
    gateway.shutdown().await;
    Ok(())
}

async fn run_test_connection(config: AppConfig, provider: Option<ProviderKind>) -> anyhow::Result<()> {
    let mut gateway = config.to_gateway();
    let outcome = gateway.test_connection(provider).await?;
    gateway.shutdown().await;

    if outcome.success {
        println!("✓ {}", outcome.message);
        Ok(())
    } else {
        eprintln!("✗ {}", outcome.message);
        std::process::exit(1);
    }
}

async fn run_check(config: AppConfig) -> anyhow::Result<()> {
    let gateway = config.to_gateway();
    let engine = AnalysisEngine::new(
        gateway,
        Arc::new(JsonLibrary::in_memory(Vec::new())),
        Arc::new(TemplateLibrary::new()),
        config.analysis.clone(),
    );

    match engine.can_start_analysis() {
        Ok(()) => {
            let gateway = engine.gateway();
            println!(
                "Ready: {} with model {}",
                gateway.active_provider().map(|k| k.to_string()).unwrap_or_default(),
                gateway.default_model(None).unwrap_or_default()
            );
            Ok(())
        }
        Err(reason) => {
            eprintln!("Not ready: {}", reason);
            std::process::exit(1);
        }
    }
}

async fn run_note_stats(config: AppConfig, document_id: &str) -> anyhow::Result<()> {
    let library = open_library(&config).await?;
    let stats = notes_stats(&*library, document_id).await?;

    println!("Notes:           {}", stats.total);
    println!("AI generated:    {}", stats.ai_generated);
    for (template_id, count) in &stats.by_template {
        println!("  {:<22} {}", template_id, count);
    }
    Ok(())
}

async fn run_export_note(
    config: AppConfig,
    document_id: &str,
    note_id: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let library = open_library(&config).await?;
    let markdown = export_note_markdown(&*library, document_id, note_id).await?;
    match output {
        Some(path) => {
            std::fs::write(&path, markdown).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Wrote note {} to {:?}", note_id, path);
        }
        None => print!("{}", markdown),
    }
    Ok(())
}

async fn run_delete_notes(config: AppConfig, document_id: &str) -> anyhow::Result<()> {
    let library = open_library(&config).await?;
    let removed = delete_analysis_notes(&*library, document_id).await?;
    println!("Removed {} analysis notes from {}", removed, document_id);
    Ok(())
}

fn show_template_stats(templates: &TemplateLibrary) {
    let stats = templates.stats();
    println!("Templates:       {}", stats.total);
    println!("Built-in:        {}", stats.default);
    println!("Custom:          {}", stats.custom);
    for (category, count) in &stats.by_category {
        println!("  {:<22} {}", category, count);
    }
}

fn show_templates(templates: &TemplateLibrary, category: Option<&str>) {
    let listed: Vec<PromptTemplate> = match category {
        Some(category) => templates.by_category(category).into_iter().cloned().collect(),
        None => templates.list(),
    };
    if listed.is_empty() {
        println!("No templates in this category. Known: {}", templates.categories().join(", "));
        return;
    }
    for template in listed {
        let marker = if template.is_default { "built-in" } else { "custom" };
        println!("{:<24} {:<36} [{}]", template.id, template.name, marker);
        if let Some(description) = &template.description {
            println!("{:<24} {}", "", description);
        }
    }
}
