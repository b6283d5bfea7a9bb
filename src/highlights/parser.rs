use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

use super::HighlightCandidate;
use crate::timestamp::{decode, TimestampStyle};

/// Parser diagnostics. Malformed model output is expected, not exceptional:
/// callers treat both variants as "nothing to assemble".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no 'Interesting_Moments' fenced block found in model response")]
    SectionNotFound,
    #[error("'Interesting_Moments' block contained no usable records")]
    NoRecordsFound,
}

const TITLE_PLACEHOLDER: &str = "Untitled moment";

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Interesting_Moments:\s*```(.*?)```").expect("static pattern")
    })
}

fn start_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Start_Time:\s*(\d{2,}:\d{2}:\d{2})").expect("static pattern"))
}

fn end_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"End_Time:\s*(\d{2,}:\d{2}:\d{2})").expect("static pattern"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // [ \t] rather than \s: an empty label must not swallow the next line.
    RE.get_or_init(|| Regex::new(r"Title:[ \t]*(.+)").expect("static pattern"))
}

fn rationale_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Why_Interesting:[ \t]*(.+)").expect("static pattern"))
}

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\.").expect("static pattern"))
}

/// Extract highlight records from the free-form model response.
///
/// The expected shape is an `Interesting_Moments:` label followed by a
/// fenced block whose body is a numbered list of `Title:` / `Start_Time:` /
/// `End_Time:` / `Why_Interesting:` records. Only the first matching block
/// is used. Records missing either timestamp are silently dropped; missing
/// title or rationale only earns a placeholder. Candidates come back in the
/// order they appeared; chronological ordering is the planner's job.
///
/// Never panics on malformed input.
pub fn parse_highlights(response: &str) -> Result<Vec<HighlightCandidate>, ParseError> {
    let block = section_re()
        .captures(response)
        .and_then(|c| c.get(1))
        .ok_or(ParseError::SectionNotFound)?
        .as_str();

    let mut candidates = Vec::new();
    for chunk in split_records(block) {
        match extract_candidate(&chunk) {
            Some(candidate) => candidates.push(candidate),
            None => debug!("dropping record missing a timestamp: {:?}", chunk.trim()),
        }
    }

    if candidates.is_empty() {
        return Err(ParseError::NoRecordsFound);
    }

    info!("parsed {} highlight candidates", candidates.len());
    Ok(candidates)
}

/// Split the block body into per-record chunks: a chunk starts at each
/// `Title:` line and runs until the line before the next numbered-list
/// marker (`1.`, ` 2.` ...) or the end of the block.
fn split_records(block: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in block.lines() {
        if line.trim_start().starts_with("Title:") {
            if let Some(lines) = current.take() {
                chunks.push(lines.join("\n"));
            }
            current = Some(vec![line]);
        } else if list_marker_re().is_match(line) {
            if let Some(lines) = current.take() {
                chunks.push(lines.join("\n"));
            }
        } else if let Some(ref mut lines) = current {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        chunks.push(lines.join("\n"));
    }

    chunks
}

fn extract_candidate(chunk: &str) -> Option<HighlightCandidate> {
    let start_text = start_time_re().captures(chunk)?.get(1)?.as_str();
    let end_text = end_time_re().captures(chunk)?.get(1)?.as_str();

    // The strict DD:DD:DD pattern guarantees these decode.
    let start = decode(start_text, TimestampStyle::Plain).ok()?;
    let end = decode(end_text, TimestampStyle::Plain).ok()?;

    let title = title_re()
        .captures(chunk)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());

    let rationale = rationale_re()
        .captures(chunk)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(HighlightCandidate {
        title,
        start,
        end,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"Here is the analysis you asked for.

#### Interesting_Moments:
```
1.
Title: Bold cup prediction
Start_Time: 00:02:10
End_Time: 00:02:45
Why_Interesting: A confident call that sparks a heated back-and-forth.

2.
Title: The own-goal story
Start_Time: 00:10:05
End_Time: 00:11:00
Why_Interesting: Funny anecdote with high energy.
```

#### Suggested_Cut_Points:
```
1.
Cut_Timestamp: 00:05:00
Reason: Topic shift.
```
"#;

    #[test]
    fn test_happy_path_two_records_in_source_order() {
        let candidates = parse_highlights(WELL_FORMED).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Bold cup prediction");
        assert_eq!(candidates[0].start, 130.0);
        assert_eq!(candidates[0].end, 165.0);
        assert_eq!(candidates[1].start, 605.0);
        assert_eq!(candidates[1].end, 660.0);
        assert!(candidates[1].rationale.contains("Funny anecdote"));
    }

    #[test]
    fn test_missing_section() {
        let err = parse_highlights("The model refused to cooperate.").unwrap_err();
        assert_eq!(err, ParseError::SectionNotFound);
    }

    #[test]
    fn test_unclosed_fence_is_section_not_found() {
        let text = "Interesting_Moments:\n```\n1.\nTitle: x\nStart_Time: 00:00:01\nEnd_Time: 00:00:02\n";
        assert_eq!(parse_highlights(text).unwrap_err(), ParseError::SectionNotFound);
    }

    #[test]
    fn test_partial_record_dropped_neighbors_kept() {
        let text = r#"Interesting_Moments:
```
1.
Title: Complete
Start_Time: 00:00:10
End_Time: 00:00:20
Why_Interesting: Fine.

2.
Title: Missing end time
Start_Time: 00:01:00
Why_Interesting: The model forgot one field.

3.
Title: Also complete
Start_Time: 00:02:00
End_Time: 00:02:30
Why_Interesting: Fine too.
```"#;
        let candidates = parse_highlights(text).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Complete");
        assert_eq!(candidates[1].title, "Also complete");
    }

    #[test]
    fn test_zero_valid_records() {
        let text = "Interesting_Moments:\n```\n1.\nTitle: only a title\n```";
        assert_eq!(parse_highlights(text).unwrap_err(), ParseError::NoRecordsFound);
    }

    #[test]
    fn test_missing_title_gets_placeholder() {
        let text = "Interesting_Moments:\n```\nTitle:\nStart_Time: 00:00:01\nEnd_Time: 00:00:05\n```";
        let candidates = parse_highlights(text).unwrap();
        assert_eq!(candidates[0].title, TITLE_PLACEHOLDER);
        assert_eq!(candidates[0].rationale, "");
    }

    #[test]
    fn test_only_first_fenced_block_used() {
        let text = r#"Interesting_Moments:
```
Title: First block
Start_Time: 00:00:01
End_Time: 00:00:02
```
Interesting_Moments:
```
Title: Second block
Start_Time: 00:00:03
End_Time: 00:00:04
```"#;
        let candidates = parse_highlights(text).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "First block");
    }

    #[test]
    fn test_inverted_range_still_parses() {
        // Validation is the planner's job, not the parser's.
        let text = "Interesting_Moments:\n```\nTitle: Backwards\nStart_Time: 00:05:00\nEnd_Time: 00:01:00\n```";
        let candidates = parse_highlights(text).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].end < candidates[0].start);
    }
}
