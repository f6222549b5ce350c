//! Markdown summary generation
//!
//! This module generates a human-readable summary of a verification run: the
//! application, the decision, and every scored page.

use crate::pipeline::VerificationReport;
use crate::VetError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of `report` to `output_path`
pub fn write_markdown_summary(report: &VerificationReport, output_path: &Path) -> Result<(), VetError> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a verification report as markdown
pub fn format_markdown_summary(report: &VerificationReport) -> String {
    let mut md = String::new();

    md.push_str("# Applicant Verification Result\n\n");

    // Application
    md.push_str("## Application\n\n");
    md.push_str(&format!("- **Company**: {}\n", report.applicant.company));
    md.push_str(&format!("- **Address**: {}\n", report.applicant.address));
    md.push_str(&format!("- **Phone**: {}\n", report.applicant.tel));
    md.push_str(&format!(
        "- **Other**: {}\n\n",
        report.applicant.other.join(", ")
    ));

    // Decision
    md.push_str("## Decision\n\n");
    md.push_str(&format!(
        "- **Match**: {}\n",
        if report.found { "yes" } else { "no" }
    ));
    md.push_str(&format!(
        "- **Best Score**: {:.3} (threshold {:.2})\n",
        report.best_score, report.score_threshold
    ));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    if let Some(detail) = &report.detail {
        md.push_str(&format!("- **Reason**: {}\n", detail));
    }
    md.push_str(&format!(
        "- **Searched URLs**: {}\n",
        report.searched_url_count
    ));
    md.push_str(&format!(
        "- **Early Terminated**: {}\n",
        if report.early_terminated { "yes" } else { "no" }
    ));
    md.push_str(&format!(
        "- **Generated**: {}\n\n",
        report.generated_at.to_rfc3339()
    ));

    if !report.queries.is_empty() {
        md.push_str("## Queries\n\n");
        for (i, query) in report.queries.iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, query));
        }
        md.push('\n');
    }

    if report.failed_queries > 0 || report.timed_out_units > 0 {
        md.push_str("## Problems\n\n");
        md.push_str(&format!("- **Failed Queries**: {}\n", report.failed_queries));
        md.push_str(&format!(
            "- **Timed Out Sites**: {}\n\n",
            report.timed_out_units
        ));
    }

    // Details
    md.push_str("## Scored Pages\n\n");
    if report.results.is_empty() {
        md.push_str("No pages were scored.\n\n");
    }
    for (i, result) in report.results.iter().enumerate() {
        let title = if result.title.is_empty() {
            "(untitled)"
        } else {
            result.title.as_str()
        };
        md.push_str(&format!("### {}. {}\n\n", i + 1, title));
        md.push_str(&format!("- **URL**: {}\n", result.url));
        md.push_str(&format!("- **Score**: {:.3}\n", result.verdict.score));
        md.push_str(&format!(
            "- **Confidence**: {:.2}\n",
            result.verdict.confidence
        ));
        md.push_str(&format!(
            "- **Found By**: query {}, result {}, page {} (depth {})\n",
            result.search_rank, result.result_rank, result.page_rank, result.depth
        ));
        md.push_str(&format!(
            "- **Content Length**: {} chars\n",
            result.content_length
        ));
        md.push_str(&format!("- **Reasoning**: {}\n", result.verdict.reasoning));
        if !result.verdict.matched_info.is_empty() {
            md.push_str(&format!(
                "- **Matched**: {}\n",
                result.verdict.matched_info.join(", ")
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n");
    md.push_str("*Generated automatically*\n");

    md
}
