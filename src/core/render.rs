use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::core::display::SubReportView;
use crate::core::report::ReportFormat;

/// Transfer encoding a file should be given inside the mail envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEncoding {
    Base64,
    Binary,
}

/// An inline file produced by the renderer (eg an embedded chart image)
/// or attached by the delivery engine (the PDF body). Files carrying a
/// content id can be referenced from HTML bodies.
#[derive(Debug, Clone)]
pub struct InlineFile {
    pub content: Vec<u8>,
    pub mime_type: String,
    pub encoding: FileEncoding,
    pub filename: String,
    pub content_id: Option<String>,
}

/// Output of the rendering engine for one report instance.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub content: Vec<u8>,
    pub content_type: String,
    pub inline_files: Vec<InlineFile>,
}

/// The rendering engine, external to this core: turns the per-sub-report
/// display decisions into presentable bytes.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        format: ReportFormat,
        title: &str,
        pretty_date: &str,
        views: &[SubReportView],
    ) -> Result<RenderedReport>;
}

/// Minimal built-in renderer for the standalone binary: a sectioned HTML
/// document honoring the display flags. PDF output needs the real
/// rendering engine and is refused here.
pub struct HtmlRenderer;

#[async_trait]
impl Renderer for HtmlRenderer {
    async fn render(
        &self,
        format: ReportFormat,
        title: &str,
        pretty_date: &str,
        views: &[SubReportView],
    ) -> Result<RenderedReport> {
        if format != ReportFormat::Html {
            bail!("the built-in renderer only produces html, not {}", format.as_str());
        }

        let mut html = String::new();
        html.push_str("<html><body>");
        html.push_str(&format!("<h1>{title}</h1><p>{pretty_date}</p>"));

        for view in views {
            html.push_str(&format!("<h2>{}</h2>", view.meta.name));

            if view.display_graph
                && let Some(ref url) = view.meta.graph_url
            {
                let variant = if view.evolution_graph { "evolution" } else { "static" };
                html.push_str(&format!(
                    "<div class=\"graph\" data-variant=\"{variant}\" data-src=\"{url}\"></div>"
                ));
            }

            if view.display_table {
                html.push_str("<table><tr>");
                for column in &view.columns {
                    html.push_str(&format!("<th>{}</th>", column.label));
                }
                html.push_str("</tr></table>");
            }
        }

        html.push_str("</body></html>");

        Ok(RenderedReport {
            content: html.into_bytes(),
            content_type: "text/html; charset=utf-8".to_string(),
            inline_files: Vec::new(),
        })
    }
}
