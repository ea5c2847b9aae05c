//! Terminal output for answers.

use std::io::{self, Write};

use reqmind_runtime::QueryResult;

/// Print `result` to stdout, as JSON when `json` is set.
pub fn print_result(result: &QueryResult, json: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, result)?;
        writeln!(out)?;
    } else {
        write_result(&mut out, result)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_result(out: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    writeln!(out, "\nAnswer:\n{}\n", result.answer)?;
    if result.sources.is_empty() {
        writeln!(out, "Sources: none")?;
        return Ok(());
    }
    writeln!(out, "Sources:")?;
    for (i, source) in result.sources.iter().enumerate() {
        let location = match source.page {
            Some(page) => format!("{}, page {}", source.source, page),
            None => source.source.clone(),
        };
        writeln!(
            out,
            "  [{}] {} (distance {:.3})",
            i + 1,
            location,
            source.distance
        )?;
        writeln!(out, "      {}", source.snippet.replace('\n', " "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqmind_runtime::SourceCitation;

    fn render(result: &QueryResult) -> String {
        let mut buf = Vec::new();
        write_result(&mut buf, result).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_sources_are_numbered_with_pages() {
        let result = QueryResult {
            answer: "REQ-002 covers export.".into(),
            sources: vec![
                SourceCitation {
                    source: "srs.pdf".into(),
                    page: Some(4),
                    snippet: "REQ-002: reports\nexport".into(),
                    distance: 0.25,
                },
                SourceCitation {
                    source: "notes.md".into(),
                    page: None,
                    snippet: "REQ-001".into(),
                    distance: 0.5,
                },
            ],
        };
        let text = render(&result);
        assert!(text.contains("Answer:\nREQ-002 covers export."));
        assert!(text.contains("[1] srs.pdf, page 4 (distance 0.250)"));
        assert!(text.contains("REQ-002: reports export"));
        assert!(text.contains("[2] notes.md (distance 0.500)"));
    }

    #[test]
    fn test_no_sources() {
        let result = QueryResult {
            answer: "I don't know.".into(),
            sources: vec![],
        };
        assert!(render(&result).ends_with("Sources: none\n"));
    }
}
