//! Template inspection reports
//!
//! This module renders what preparation learned about a template in the
//! output formats of the `inspect` command (JSON, Markdown, summary).

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::formats::DocumentFormat;
use crate::template::PreparedTemplate;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateReport {
    pub file: String,
    pub format: DocumentFormat,
    pub created_at: DateTime<Local>,
    pub variables: Vec<String>,
    /// Variables absent from the checked data, if data was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl TemplateReport {
    pub fn from_template(template: &PreparedTemplate) -> Self {
        Self {
            file: template.source().display().to_string(),
            format: template.format(),
            created_at: template.created_at(),
            variables: template.variables().iter().map(|p| p.to_string()).collect(),
            missing: None,
        }
    }

    /// Check the template's variables against render data
    pub fn with_data(mut self, template: &PreparedTemplate, data: &serde_json::Value) -> Self {
        self.missing = Some(
            template
                .variables()
                .missing_in(data)
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
        );
        self
    }

    pub fn missing_count(&self) -> usize {
        self.missing.as_ref().map_or(0, Vec::len)
    }
}

pub fn generate_json_report(report: &TemplateReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn generate_markdown_report(report: &TemplateReport) -> String {
    let mut lines = vec![
        "# Template Report".to_string(),
        String::new(),
        format!("**File**: {}", report.file),
        format!("**Format**: {}", report.format),
        format!("**Prepared**: {}", report.created_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    if report.variables.is_empty() {
        lines.push("## No variables found".to_string());
    } else {
        lines.push(format!("## Variables ({})", report.variables.len()));
        lines.push(String::new());
        for var in &report.variables {
            lines.push(format!("- `{}`", var));
        }
    }

    if let Some(missing) = &report.missing {
        lines.push(String::new());
        if missing.is_empty() {
            lines.push("All variables are provided by the data.".to_string());
        } else {
            lines.push(format!("## Missing from data ({})", missing.len()));
            lines.push(String::new());
            for var in missing {
                lines.push(format!("- `{}`", var));
            }
        }
    }

    lines.join("\n")
}

pub fn generate_summary_report(report: &TemplateReport) -> String {
    let mut lines = vec![
        format!("Template {}", report.file),
        format!("  Format:    {}", report.format),
        format!("  Prepared:  {}", report.created_at.format("%Y-%m-%d %H:%M:%S")),
        format!("  Variables: {}", report.variables.len()),
    ];
    for var in &report.variables {
        lines.push(format!("    {}", var));
    }
    if let Some(missing) = &report.missing {
        if missing.is_empty() {
            lines.push("[OK] Data provides every variable".to_string());
        } else {
            lines.push(format!("  Missing:   {}", missing.len()));
            for var in missing {
                lines.push(format!("    {}", var));
            }
        }
    }
    lines.join("\n")
}
