use serde::{Deserialize, Serialize};

use crate::timestamp::{encode, TimestampStyle};

/// A transcribed span of speech.
///
/// Produced by the transcription service in chronological order. Segments
/// may overlap slightly (transcription backends do emit that), but
/// `start <= end` is a hard invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl SpeechSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        debug_assert!(start <= end, "segment start must not exceed end");
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Render segments as the annotated-line transcript handed to the LLM:
/// one `[HH:MM:SS] text` line per segment.
pub fn to_prompt_text(segments: &[SpeechSegment]) -> String {
    segments
        .iter()
        .map(|s| {
            format!(
                "[{}] {}\n",
                encode(s.start, TimestampStyle::Plain),
                s.text.trim()
            )
        })
        .collect()
}

/// Render segments as a SubRip file: 1-based cue number, timestamp line,
/// trimmed text, blank-line separator. Newlines embedded in a segment's
/// text pass through verbatim inside the cue.
pub fn to_srt(segments: &[SpeechSegment]) -> String {
    let mut srt = String::new();
    for (i, segment) in segments.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            encode(segment.start, TimestampStyle::Subtitle),
            encode(segment.end, TimestampStyle::Subtitle),
            segment.text.trim()
        ));
    }
    srt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<SpeechSegment> {
        vec![
            SpeechSegment::new(0.0, 4.2, "  Hello and welcome  "),
            SpeechSegment::new(4.2, 9.75, "Today we predict the cup."),
            SpeechSegment::new(9.75, 15.0, "Let's get started."),
        ]
    }

    #[test]
    fn test_prompt_text_one_line_per_segment() {
        let text = to_prompt_text(&segments());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[00:00:00] Hello and welcome");
        assert_eq!(lines[1], "[00:00:04] Today we predict the cup.");
    }

    #[test]
    fn test_srt_numbered_cues() {
        let srt = to_srt(&segments());
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:04,200\nHello and welcome\n\n"));
        assert!(srt.contains("2\n00:00:04,200 --> 00:00:09,750\n"));
        assert!(srt.contains("3\n00:00:09,750 --> 00:00:15,000\n"));
        assert_eq!(srt.matches("-->").count(), 3);
    }

    #[test]
    fn test_srt_preserves_embedded_newlines() {
        let segs = vec![SpeechSegment::new(0.0, 2.0, "line one\nline two")];
        let srt = to_srt(&segs);
        assert!(srt.contains("line one\nline two\n\n"));
    }

    #[test]
    fn test_empty_segments() {
        assert_eq!(to_prompt_text(&[]), "");
        assert_eq!(to_srt(&[]), "");
    }
}
