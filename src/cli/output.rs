use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::error::RunFailure;
use crate::models::{OutputFormat, RunReport, ValidationReport};

pub trait Formatter {
    fn format_run_report(&self, report: &RunReport) -> String;
    fn format_validation(&self, report: &ValidationReport) -> String;
    fn format_failure(&self, failure: &FailureInfo) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_dimension: u32,
    pub api_key_configured: bool,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub collection_exists: bool,
    pub collection_points: u64,
    pub collection_dimension: Option<u64>,
}

/// Summary of an aborted run, shaped for output.
#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub kind: String,
    pub message: String,
    pub state: String,
    pub line: Option<usize>,
    pub fragment_id: Option<String>,
    pub persisted: u64,
}

impl From<&RunFailure> for FailureInfo {
    fn from(failure: &RunFailure) -> Self {
        Self {
            kind: failure.error.kind().to_string(),
            message: failure.error.to_string(),
            state: failure.failed_in.to_string(),
            line: failure.error.line(),
            fragment_id: failure.error.fragment().map(|f| f.id.to_string()),
            persisted: failure.persisted,
        }
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Collection:      {}", report.collection).unwrap();
        writeln!(
            output,
            "Provisioned:     {}",
            if report.provisioned { "yes (recreated)" } else { "no (appended)" }
        )
        .unwrap();
        writeln!(output, "Fragments read:  {}", report.fragments_read).unwrap();
        writeln!(output, "Points stored:   {}", report.points_persisted).unwrap();
        writeln!(output, "Batches:         {}", report.batches_flushed).unwrap();
        writeln!(output, "Duration:        {}ms", report.duration_ms).unwrap();
        output
    }

    fn format_validation(&self, report: &ValidationReport) -> String {
        let mut output = String::new();
        writeln!(output, "Validation successful").unwrap();
        writeln!(output, "Source:          {}", report.source).unwrap();
        writeln!(output, "Fragments:       {}", report.fragments).unwrap();
        if report.duplicate_ids > 0 {
            writeln!(
                output,
                "Duplicate ids:   {} (later fragments overwrite earlier ones)",
                report.duplicate_ids
            )
            .unwrap();
        }
        output
    }

    fn format_failure(&self, failure: &FailureInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Failed").unwrap();
        writeln!(output, "----------------").unwrap();
        writeln!(output, "Error:           {}", failure.message).unwrap();
        writeln!(output, "Kind:            {}", failure.kind).unwrap();
        writeln!(output, "Stage:           {}", failure.state).unwrap();
        if let Some(line) = failure.line {
            writeln!(output, "Line:            {}", line).unwrap();
        }
        if let Some(ref id) = failure.fragment_id {
            writeln!(output, "Fragment:        {}", id).unwrap();
        }
        writeln!(output, "Points stored:   {}", failure.persisted).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        writeln!(output, "Embedding:     {}", status.embedding_model).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        writeln!(output, "  Dimension:   {}", status.embedding_dimension).unwrap();
        writeln!(
            output,
            "  API key:     {}",
            if status.api_key_configured { "[SET]" } else { "[MISSING]" }
        )
        .unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  URL:         {}", status.vector_store_url).unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        if status.collection_exists {
            writeln!(output, "  Points:      {}", status.collection_points).unwrap();
            if let Some(dim) = status.collection_dimension {
                writeln!(output, "  Dimension:   {}", dim).unwrap();
            }
        } else if status.vector_store_connected {
            writeln!(output, "  (collection does not exist yet)").unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl Formatter for JsonFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        self.render(&serde_json::json!({
            "status": "done",
            "report": report,
        }))
    }

    fn format_validation(&self, report: &ValidationReport) -> String {
        self.render(&serde_json::json!({
            "status": "valid",
            "report": report,
        }))
    }

    fn format_failure(&self, failure: &FailureInfo) -> String {
        self.render(&serde_json::json!({
            "status": "failed",
            "error": failure,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "model": status.embedding_model,
                "url": status.embedding_url,
                "dimension": status.embedding_dimension,
                "api_key_configured": status.api_key_configured,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "exists": status.collection_exists,
                "points": status.collection_points,
                "dimension": status.collection_dimension,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Collection | `{}` |", report.collection).unwrap();
        writeln!(output, "| Provisioned | {} |", report.provisioned).unwrap();
        writeln!(output, "| Fragments read | {} |", report.fragments_read).unwrap();
        writeln!(output, "| Points stored | {} |", report.points_persisted).unwrap();
        writeln!(output, "| Batches | {} |", report.batches_flushed).unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms).unwrap();
        output
    }

    fn format_validation(&self, report: &ValidationReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Validation Successful\n").unwrap();
        writeln!(output, "- **Source:** `{}`", report.source).unwrap();
        writeln!(output, "- **Fragments:** {}", report.fragments).unwrap();
        writeln!(output, "- **Duplicate ids:** {}", report.duplicate_ids).unwrap();
        output
    }

    fn format_failure(&self, failure: &FailureInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion Failed ❌\n").unwrap();
        writeln!(output, "> {}\n", failure.message).unwrap();
        writeln!(output, "- **Kind:** `{}`", failure.kind).unwrap();
        writeln!(output, "- **Stage:** {}", failure.state).unwrap();
        if let Some(line) = failure.line {
            writeln!(output, "- **Line:** {}", line).unwrap();
        }
        if let Some(ref id) = failure.fragment_id {
            writeln!(output, "- **Fragment:** `{}`", id).unwrap();
        }
        writeln!(output, "- **Points stored:** {}", failure.persisted).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let key_status = if status.api_key_configured { "✅" } else { "❌" };
        writeln!(output, "### Embedding {}\n", key_status).unwrap();
        writeln!(output, "- **Model:** {}", status.embedding_model).unwrap();
        writeln!(output, "- **URL:** `{}`", status.embedding_url).unwrap();
        writeln!(output, "- **Dimension:** {}", status.embedding_dimension).unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.vector_store_url).unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Exists:** {}", status.collection_exists).unwrap();
        writeln!(output, "- **Points:** {}", status.collection_points).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
