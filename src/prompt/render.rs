//! Prompt Renderer - Render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{ArcaneError, Result};

/// Renders prompt templates using Handlebars templating
#[derive(Clone)]
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a new PromptRenderer with default settings
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render as empty strings
        handlebars.set_strict_mode(false);
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render a template string with any serializable context
    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| ArcaneError::Template(format!("Failed to render template: {}", e)))
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| ArcaneError::Template(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a previously registered template
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| ArcaneError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let renderer = PromptRenderer::new();
        let result = renderer.render("Hello, {{name}}!", &json!({"name": "World"})).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_render_missing_variable_empty_string() {
        let renderer = PromptRenderer::new();
        let result = renderer.render("Goal: {{goal}}.", &json!({})).unwrap();
        assert_eq!(result, "Goal: .");
    }

    #[test]
    fn test_render_no_escape() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render("{{params}}", &json!({"params": "{\"file_name\": \"<a&b>.txt\"}"}))
            .unwrap();
        assert_eq!(result, "{\"file_name\": \"<a&b>.txt\"}");
    }

    #[test]
    fn test_render_with_serializable() {
        #[derive(Serialize)]
        struct Context {
            name: String,
            count: i32,
        }

        let renderer = PromptRenderer::new();
        let context = Context {
            name: "STRATOS".to_string(),
            count: 3,
        };
        let result = renderer.render("{{name}} has {{count}} levels", &context).unwrap();
        assert_eq!(result, "STRATOS has 3 levels");
    }

    #[test]
    fn test_register_and_render_named() {
        let mut renderer = PromptRenderer::new();
        renderer.register_template("greeting", "Hello, {{name}}!").unwrap();
        assert!(renderer.has_template("greeting"));
        let result = renderer.render_named("greeting", &json!({"name": "agent"})).unwrap();
        assert_eq!(result, "Hello, agent!");
    }

    #[test]
    fn test_render_named_not_found() {
        let renderer = PromptRenderer::new();
        let result = renderer.render_named("nonexistent", &json!({}));
        assert!(matches!(result, Err(ArcaneError::Template(_))));
    }

    #[test]
    fn test_register_invalid_template() {
        let mut renderer = PromptRenderer::new();
        let result = renderer.register_template("broken", "{{#if}}unclosed");
        assert!(result.is_err());
    }

    #[test]
    fn test_render_each_block() {
        let renderer = PromptRenderer::new();
        let template = "{{#each actions}}- {{this.name}}: {{this.description}}\n{{/each}}";
        let context = json!({"actions": [
            {"name": "send_message", "description": "Reply to the user"},
            {"name": "list_files", "description": "List the work directory"}
        ]});
        let result = renderer.render(template, &context).unwrap();
        assert_eq!(
            result,
            "- send_message: Reply to the user\n- list_files: List the work directory\n"
        );
    }
}
