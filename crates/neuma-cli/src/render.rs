use neuma_core::{DisplayArtifact, TurnOutcome, TurnWarning};

/// Plain-text rendering of a display artifact for the terminal.
pub fn render_artifact(artifact: &DisplayArtifact) -> String {
    match artifact {
        DisplayArtifact::PlainText(text) | DisplayArtifact::CsvText(text) => text.clone(),
        DisplayArtifact::Table(table) => table.to_string().trim_end().to_string(),
        DisplayArtifact::CodeBlock { language, code } => {
            let code = code.trim_matches('\n');
            format!("```{}\n{}\n```", language.as_deref().unwrap_or(""), code)
        }
    }
}

pub fn render_warning(warning: &TurnWarning) -> String {
    format!("warning: {warning}")
}

/// Warnings first, then the artifact.
pub fn render_outcome(outcome: &TurnOutcome) -> String {
    let mut lines: Vec<String> = outcome.warnings.iter().map(render_warning).collect();
    lines.push(render_artifact(&outcome.artifact));
    lines.join("\n")
}
