//! Grounded-answer prompt template
//!
//! One configurable format string decides how retrieved context and the
//! user question reach the model, so operators can tune grounding
//! instructions without code changes. Rendering is deterministic string
//! interpolation; the template must clearly delimit context from question.

use doctalk_common::errors::{AppError, Result};

/// Placeholder replaced by the assembled context.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced by the user question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Validated prompt template with `{context}` and `{question}`
/// placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Build a template, rejecting format strings that are missing a
    /// placeholder (a configuration error, caught at startup).
    pub fn new(template: &str) -> Result<Self> {
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(AppError::Configuration {
                    message: format!(
                        "prompt template is missing the {} placeholder",
                        placeholder
                    ),
                });
            }
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Interpolate context and question into the template.
    pub fn render(&self, context: &str, question: &str) -> String {
        self.template
            .replace(CONTEXT_PLACEHOLDER, context)
            .replace(QUESTION_PLACEHOLDER, question)
    }
}
