//! Lineage extraction prompt
//!
//! Prompts are minijinja templates rendered with three variables:
//! `schema`, `object_name` and `sql` (the normalized definition). The
//! built-in template fixes one extraction policy for every object kind:
//!
//! - sources are objects read, targets are objects written, or the view
//!   being defined
//! - temporary tables and table variables are resolved through, never emitted
//! - called procedures and functions are not lineage nodes
//! - names come back as bare `schema.object`

use minijinja::{context, Environment, UndefinedBehavior};
use std::path::{Path, PathBuf};

/// Built-in extraction prompt
pub const DEFAULT_TEMPLATE: &str = r##"You are a data lineage analyst. Read the SQL definition of {{ schema }}.{{ object_name }} and list every table-level data flow it performs.

Rules:
1. A "source" is a table or view the code reads from. A "target" is a table the code writes to (INSERT, UPDATE, DELETE, MERGE, SELECT INTO, TRUNCATE). For a view definition the target is the view itself, {{ schema }}.{{ object_name }}.
2. Temporary tables (#name, ##name) and table variables (@name) are intermediate steps. Do not list them. Connect the tables that feed them directly to the permanent tables they end up in.
3. Do not list stored procedures or functions that the code calls.
4. Write every name as schema.object with no brackets or quotes. When the schema is omitted, use dbo.
5. List each source and target pair once.

Return one JSON document and nothing else, in exactly this shape:
{"lineage": [{"source": "schema.object", "target": "schema.object"}]}
If the code moves no data between tables, return {"lineage": []}.

SQL:
{{ sql }}
"##;

/// Errors loading or rendering a prompt template
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Failed to read prompt template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid prompt template: {0}")]
    Syntax(String),

    #[error("Prompt render error: {0}")]
    Render(String),
}

/// Compiled-on-load prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// The built-in template
    pub fn builtin() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Load a template from a file
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let source = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(source)
    }

    /// Use `source` as the template, checking its syntax up front
    pub fn from_source(source: impl Into<String>) -> Result<Self, PromptError> {
        let source = source.into();
        let env = environment();
        if let Err(e) = env.template_from_str(&source) {
            return Err(PromptError::Syntax(e.to_string()));
        }
        Ok(Self { source })
    }

    /// Load from `path` when given, otherwise the built-in template
    pub fn load(path: Option<&Path>) -> Result<Self, PromptError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Render the prompt for one object
    pub fn render(&self, schema: &str, object_name: &str, sql: &str) -> Result<String, PromptError> {
        environment()
            .render_str(
                &self.source,
                context! {
                    schema => schema,
                    object_name => object_name,
                    sql => sql,
                },
            )
            .map_err(|e| PromptError::Render(e.to_string()))
    }

    /// Template source
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_template_renders_object_and_sql() {
        let prompt = PromptTemplate::builtin()
            .render("dbo", "usp_load_orders", "INSERT INTO dbo.orders SELECT * FROM stg.orders")
            .unwrap();

        assert!(prompt.contains("dbo.usp_load_orders"));
        assert!(prompt.contains("INSERT INTO dbo.orders SELECT * FROM stg.orders"));
        assert!(prompt.contains(r#"{"lineage": [{"source": "schema.object", "target": "schema.object"}]}"#));
    }

    #[test]
    fn sql_with_template_syntax_is_not_interpreted() {
        let prompt = PromptTemplate::from_source("{{ sql }}")
            .unwrap()
            .render("dbo", "p", "SELECT '{{ x }}'")
            .unwrap();
        assert_eq!(prompt, "SELECT '{{ x }}'");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let template = PromptTemplate::from_source("{{ table }}").unwrap();
        assert!(matches!(template.render("dbo", "p", ""), Err(PromptError::Render(_))));
    }

    #[test]
    fn syntax_errors_are_reported_on_load() {
        assert!(matches!(PromptTemplate::from_source("{% if %}"), Err(PromptError::Syntax(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Lineage for {{ object_name }}:\n{{ sql }}").unwrap();

        let template = PromptTemplate::load(Some(&path)).unwrap();
        assert_eq!(template.render("dbo", "v", "SELECT 1").unwrap(), "Lineage for v:\nSELECT 1");

        assert!(PromptTemplate::load(Some(&dir.path().join("missing.txt"))).is_err());
    }
}
