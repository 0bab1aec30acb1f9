//! HTML and JSON projections of a directory snapshot

use minijinja::{context, Environment};
use registry_core::Endpoint;
use serde::Serialize;
use std::collections::BTreeMap;

// Rendered under an `.html` name so values are escaped
const DIRECTORY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>Registry</title>
  </head>
  <body>
    <h1>Service Registry</h1>
    <h2>Backends</h2>
{%- for endpoint in endpoints %}
    <p>{{ endpoint.name }}: {{ endpoint.address }}
    {%- if endpoint.tags %} <small>[{% for tag in endpoint.tags %}{% if not loop.first %}, {% endif %}{{ tag }}{% endfor %}]</small>{% endif %}</p>
{%- else %}
    <p><em>No endpoints registered</em></p>
{%- endfor %}
  </body>
</html>
"#;

#[derive(Serialize)]
struct DirectoryView<'a> {
    endpoints: Vec<&'a Endpoint>,
}

/// Render the directory as `{"endpoints": [...]}`, ordered by name
pub fn directory_json(snapshot: &BTreeMap<String, Endpoint>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DirectoryView {
        endpoints: snapshot.values().collect(),
    })
}

/// Render the directory as a human-readable page
pub fn directory_html(snapshot: &BTreeMap<String, Endpoint>) -> Result<String, minijinja::Error> {
    let environment = Environment::new();
    environment.render_named_str(
        "directory.html",
        DIRECTORY_TEMPLATE,
        context! { endpoints => snapshot.values().collect::<Vec<_>>() },
    )
}
