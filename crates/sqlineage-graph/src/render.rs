//! Traversal rendering
//!
//! Mermaid flowchart text, and a standalone HTML page that renders it in a
//! browser through the Mermaid CDN script.

use crate::traverse::Traversal;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Assigns each object name a Mermaid-safe id, unique within one diagram
#[derive(Default)]
struct NodeIds {
    ids: HashMap<String, String>,
    taken: HashMap<String, usize>,
}

impl NodeIds {
    fn id(&mut self, name: &str) -> String {
        if let Some(id) = self.ids.get(name) {
            return id.clone();
        }

        let base = sanitize_id(name);
        let count = self.taken.entry(base.clone()).or_insert(0);
        *count += 1;
        let id = if *count == 1 { base } else { format!("{}_{}", base, count) };

        self.ids.insert(name.to_string(), id.clone());
        id
    }
}

/// Map a name onto `[A-Za-z0-9_]`
fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if id.is_empty() {
        "node".to_string()
    } else {
        id
    }
}

fn label(name: &str) -> String {
    name.replace('"', "#quot;")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Mermaid `graph LR` diagram with the root highlighted
pub fn render_mermaid(traversal: &Traversal) -> String {
    let mut ids = NodeIds::default();
    let mut out = String::from("graph LR\n");

    out.push_str("    classDef rootNode fill:#ff6b6b,color:#fff,stroke:#c92a2a,stroke-width:3px;\n");
    let root_id = ids.id(&traversal.root);
    let _ = writeln!(out, "    {}[\"{}\"]:::rootNode", root_id, label(&traversal.root));

    for edge in &traversal.edges {
        let source_id = ids.id(&edge.source);
        let target_id = ids.id(&edge.target);
        let _ = writeln!(
            out,
            "    {}[\"{}\"] --> {}[\"{}\"]",
            source_id,
            label(&edge.source),
            target_id,
            label(&edge.target)
        );
    }

    out
}

/// Standalone HTML page for a traversal
pub fn render_html(traversal: &Traversal) -> String {
    let title = escape_html(&traversal.root);
    let direction = traversal.direction;
    let count = traversal.edges.len();
    let diagram = escape_html(&render_mermaid(traversal));

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{direction} Lineage: {title}</title>
    <script src="https://cdn.jsdelivr.net/npm/mermaid/dist/mermaid.min.js"></script>
    <script>mermaid.initialize({{startOnLoad:true}});</script>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif; padding: 30px; background: #f5f5f5; }}
        .container {{ background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
        h2 {{ color: #333; margin-bottom: 20px; }}
        .badge {{ background-color: #228be6; color: white; padding: 6px 12px; border-radius: 4px; font-size: 0.85em; font-weight: 600; }}
        .info {{ margin-top: 20px; padding: 15px; background: #e7f5ff; border-left: 4px solid #228be6; border-radius: 4px; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>{title} <span class="badge">{direction}</span></h2>
        <div class="mermaid">
{diagram}
        </div>
        <div class="info">
            <strong>Stats:</strong> {count} dependencies found
        </div>
    </div>
</body>
</html>
"#
    )
}

/// Write the HTML page to `path`, creating parent directories
pub fn write_html(traversal: &Traversal, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_html(traversal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlineage_core::{Direction, RelationshipEdge};

    fn traversal() -> Traversal {
        Traversal {
            root: "dbo.orders".to_string(),
            direction: Direction::Downstream,
            edges: vec![
                RelationshipEdge::new("dbo.orders", "rpt.daily-sales"),
                RelationshipEdge::new("rpt.daily-sales", "rpt.daily_sales"),
            ],
        }
    }

    #[test]
    fn mermaid_diagram() {
        let expected = "graph LR\n\
            \x20   classDef rootNode fill:#ff6b6b,color:#fff,stroke:#c92a2a,stroke-width:3px;\n\
            \x20   dbo_orders[\"dbo.orders\"]:::rootNode\n\
            \x20   dbo_orders[\"dbo.orders\"] --> rpt_daily_sales[\"rpt.daily-sales\"]\n\
            \x20   rpt_daily_sales[\"rpt.daily-sales\"] --> rpt_daily_sales_2[\"rpt.daily_sales\"]\n";
        assert_eq!(render_mermaid(&traversal()), expected);
    }

    #[test]
    fn html_page() {
        let html = render_html(&traversal());
        assert!(html.contains("<title>DOWNSTREAM Lineage: dbo.orders</title>"));
        assert!(html.contains("<span class=\"badge\">DOWNSTREAM</span>"));
        assert!(html.contains("2 dependencies found"));
        assert!(html.contains("--&gt; rpt_daily_sales"));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("lineage.html");
        write_html(&traversal(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
