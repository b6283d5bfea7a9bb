use anyhow::{anyhow, Result};

/// Textual timestamp styles used across the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `HH:MM:SS`: second granularity, used in LLM prompt lines and model output.
    Plain,
    /// `HH:MM:SS,mmm`: millisecond granularity, SubRip cue timestamps.
    Subtitle,
}

/// Format a timestamp in seconds as `HH:MM:SS` or `HH:MM:SS,mmm`.
///
/// Rounds to the nearest millisecond before decomposing so repeated
/// truncation cannot accumulate drift. Hours pad to two digits but are
/// not clamped; videos longer than a day still serialize correctly.
///
/// Panics if `seconds` is negative; a negative timestamp is a
/// programmer error, not a recoverable condition.
pub fn encode(seconds: f64, style: TimestampStyle) -> String {
    assert!(seconds >= 0.0, "non-negative timestamp expected");

    let mut millis = (seconds * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    millis %= 3_600_000;
    let minutes = millis / 60_000;
    millis %= 60_000;
    let secs = millis / 1_000;
    millis %= 1_000;

    match style {
        TimestampStyle::Plain => format!("{:02}:{:02}:{:02}", hours, minutes, secs),
        TimestampStyle::Subtitle => {
            format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
        }
    }
}

/// Parse a textual timestamp back into seconds.
///
/// Subtitle style is the exact inverse of [`encode`]. Plain style loses
/// sub-second precision by construction: `decode(encode(s, Plain), Plain)`
/// only recovers `s` rounded to the whole second.
pub fn decode(text: &str, style: TimestampStyle) -> Result<f64> {
    let (hms, millis) = match style {
        TimestampStyle::Plain => (text, 0u64),
        TimestampStyle::Subtitle => {
            let (hms, ms) = text
                .split_once(',')
                .ok_or_else(|| anyhow!("invalid subtitle timestamp: {}", text))?;
            if ms.len() != 3 {
                return Err(anyhow!("invalid millisecond field: {}", text));
            }
            (hms, ms.parse::<u64>()?)
        }
    };

    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return Err(anyhow!("invalid timestamp: {}", text));
    }
    if parts[0].len() < 2 || parts[1].len() != 2 || parts[2].len() != 2 {
        return Err(anyhow!("invalid timestamp field widths: {}", text));
    }

    let hours: u64 = parts[0].parse()?;
    let minutes: u64 = parts[1].parse()?;
    let seconds: u64 = parts[2].parse()?;
    if minutes >= 60 || seconds >= 60 {
        return Err(anyhow!("timestamp field out of range: {}", text));
    }

    let total_millis = (hours * 3600 + minutes * 60 + seconds) * 1000 + millis;
    Ok(total_millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_formatting() {
        assert_eq!(encode(3661.5, TimestampStyle::Plain), "01:01:01");
        assert_eq!(encode(0.0, TimestampStyle::Plain), "00:00:00");
        assert_eq!(encode(59.999, TimestampStyle::Plain), "00:00:59");
    }

    #[test]
    fn test_subtitle_formatting() {
        assert_eq!(encode(3661.5, TimestampStyle::Subtitle), "01:01:01,500");
        assert_eq!(encode(1.5, TimestampStyle::Subtitle), "00:00:01,500");
        assert_eq!(encode(0.0, TimestampStyle::Subtitle), "00:00:00,000");
    }

    #[test]
    fn test_rounds_to_nearest_millisecond() {
        assert_eq!(encode(0.0004, TimestampStyle::Subtitle), "00:00:00,000");
        assert_eq!(encode(0.0006, TimestampStyle::Subtitle), "00:00:00,001");
    }

    #[test]
    fn test_hours_not_clamped() {
        // 30 hours
        assert_eq!(encode(108_000.0, TimestampStyle::Plain), "30:00:00");
        // 120 hours still round-trips through subtitle style
        let s = encode(432_000.25, TimestampStyle::Subtitle);
        assert_eq!(s, "120:00:00,250");
        assert_eq!(decode(&s, TimestampStyle::Subtitle).unwrap(), 432_000.25);
    }

    #[test]
    fn test_subtitle_round_trip() {
        for &s in &[0.0, 0.001, 1.5, 61.25, 3599.999, 3661.5, 359_999.999] {
            let text = encode(s, TimestampStyle::Subtitle);
            let back = decode(&text, TimestampStyle::Subtitle).unwrap();
            let rounded = (s * 1000.0).round() / 1000.0;
            assert_eq!(back, rounded, "round trip failed for {}", s);
        }
    }

    #[test]
    fn test_plain_decode_drops_subseconds() {
        let text = encode(3661.5, TimestampStyle::Plain);
        assert_eq!(decode(&text, TimestampStyle::Plain).unwrap(), 3661.0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("1:2:3", TimestampStyle::Plain).is_err());
        assert!(decode("no", TimestampStyle::Plain).is_err());
        assert!(decode("00:61:00", TimestampStyle::Plain).is_err());
        assert!(decode("00:00:05", TimestampStyle::Subtitle).is_err());
        assert!(decode("00:00:05,42", TimestampStyle::Subtitle).is_err());
    }

    #[test]
    #[should_panic(expected = "non-negative timestamp expected")]
    fn test_negative_seconds_panics() {
        encode(-1.0, TimestampStyle::Plain);
    }
}
