use bytes::Bytes;

use super::{
    error::ShoppingListError,
    model::{AggregatedLine, ReportFormat},
    pdf,
};

pub const REPORT_TITLE: &str = "Shopping list";

/// A finished report, ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub body: Bytes,
    pub content_type: &'static str,
    pub file_name: &'static str,
    pub disposition: &'static str,
}

pub fn render(
    lines: &[AggregatedLine],
    format: ReportFormat,
) -> Result<RenderedReport, ShoppingListError> {
    let body = match format {
        ReportFormat::PlainText => Bytes::from(render_plain_text(lines)),
        ReportFormat::Document => {
            let rows: Vec<String> = lines.iter().map(format_line).collect();
            Bytes::from(pdf::render_document(REPORT_TITLE, &rows)?)
        }
    };
    Ok(RenderedReport {
        body,
        content_type: format.content_type(),
        file_name: format.file_name(),
        disposition: format.content_disposition(),
    })
}

pub fn render_plain_text(lines: &[AggregatedLine]) -> String {
    let mut out = String::from(REPORT_TITLE);
    out.push('\n');
    for line in lines {
        out.push_str(&format_line(line));
        out.push('\n');
    }
    out
}

fn format_line(line: &AggregatedLine) -> String {
    format!(
        "{} ({}) \u{2014} {}",
        line.ingredient_name, line.measurement_unit, line.total_quantity
    )
}
