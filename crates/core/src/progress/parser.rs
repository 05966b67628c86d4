use regex_lite::Regex;
use std::path::Path;
use tracing::trace;

use crate::events::ProgressEvent;

/// A dip below this percent, after having been above [`RESET_HIGH_PCT`],
/// means the tool started fetching another stream.
const RESET_LOW_PCT: f32 = 50.0;
const RESET_HIGH_PCT: f32 = 90.0;

/// Past this point a stream is done and the tool goes quiet while it
/// post-processes; further Downloading ticks are churn, not information.
const PROCESSING_PCT: f32 = 99.9;

/// Post-processing tags as printed by the tool, mapped to step names.
const POSTPROCESSOR_STEPS: &[(&str, &str)] = &[
    ("[Merger]", "Merging video and audio"),
    ("[VideoConvertor]", "Converting video format"),
    ("[ExtractAudio]", "Extracting audio"),
    ("[Metadata]", "Embedding metadata"),
    ("[EmbedThumbnail]", "Embedding thumbnail"),
    ("[EmbedSubtitle]", "Embedding subtitles"),
    ("[VideoRemuxer]", "Remuxing video"),
    ("[MoveFiles]", "Moving files"),
    ("[ModifyChapters]", "Processing chapters"),
    ("[SponsorBlock]", "Processing sponsor segments"),
];

/// State machine turning one stripped output line into zero or more events.
///
/// Carried state: the last observed percent (for stream-reset detection), the
/// Downloading-suppression flag (set once a stream completes or
/// post-processing starts, cleared by the next reset), the tool's announced
/// destination, and the final printed filepath.
pub struct ProgressParser {
    percent_re: Regex,
    speed_re: Regex,
    eta_re: Regex,
    last_percent: f32,
    suppressing: bool,
    destination: Option<String>,
    final_path: Option<String>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self {
            // "[download]  45.2% of 100.00MiB at 5.23MiB/s ETA 00:30"
            percent_re: Regex::new(r"(\d+\.?\d*)%").unwrap(),
            // Speed is phrased "at 5.23MiB/s" or "~5.23MiB/s" depending on
            // whether the total size is known.
            speed_re: Regex::new(r"(?:at|~)\s*(\d[\d.]*\s*\w+/s)").unwrap(),
            eta_re: Regex::new(r"ETA\s+(\d+:\d+(?::\d+)?)").unwrap(),
            last_percent: 0.0,
            suppressing: false,
            destination: None,
            final_path: None,
        }
    }

    /// Feeds one line, returning the events it produced in order.
    ///
    /// At most two events come out of a single line (a `StreamReset`
    /// followed by the `Downloading` that revealed it).
    pub fn push(&mut self, line: &str) -> Vec<ProgressEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        if let Some(dest) = line.strip_prefix("[download] Destination:") {
            self.destination = Some(dest.trim().to_string());
            return Vec::new();
        }

        if line.contains("[download]") && line.contains('%') {
            return self.parse_progress_line(line);
        }

        if line.starts_with('[') {
            for (tag, step) in POSTPROCESSOR_STEPS {
                if line.starts_with(tag) {
                    self.suppressing = true;
                    return vec![ProgressEvent::Processing {
                        step: (*step).to_string(),
                    }];
                }
            }
            trace!(line, "Ignoring unrecognized tagged line");
            return Vec::new();
        }

        // The tool prints the final filepath once, bare, on success
        // (--print after_move:filepath). A path-looking line that exists on
        // disk, or at least carries no percent sign, is our best candidate.
        if Path::new(line).extension().is_some_and(|e| !e.is_empty())
            && (Path::new(line).exists() || !line.contains('%'))
        {
            self.final_path = Some(line.to_string());
            return Vec::new();
        }

        trace!(line, "Ignoring unrecognized line");
        Vec::new()
    }

    fn parse_progress_line(&mut self, line: &str) -> Vec<ProgressEvent> {
        let Some(percent) = self
            .percent_re
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f32>().ok())
        else {
            return Vec::new();
        };

        let speed = self
            .speed_re
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let eta = self
            .eta_re
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let mut events = Vec::new();

        // bestvideo+bestaudio jobs download streams sequentially under one
        // process; each restarts from 0%.
        if percent < RESET_LOW_PCT && self.last_percent > RESET_HIGH_PCT {
            trace!(
                from = self.last_percent,
                to = percent,
                "New stream detected"
            );
            self.suppressing = false;
            events.push(ProgressEvent::StreamReset);
        }
        self.last_percent = percent;

        if percent >= PROCESSING_PCT && !self.suppressing {
            self.suppressing = true;
            events.push(ProgressEvent::Processing {
                step: "Processing...".to_string(),
            });
        } else if !self.suppressing {
            events.push(ProgressEvent::Downloading {
                percent,
                speed,
                eta,
            });
        }

        events
    }

    /// Destination path last announced by the tool, if any.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Final filepath printed by the tool on success, if seen.
    pub fn final_path(&self) -> Option<&str> {
        self.final_path.as_deref()
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percents(events: &[ProgressEvent]) -> Vec<f32> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Downloading { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_destination_line_sets_state_without_event() {
        let mut parser = ProgressParser::new();
        let events = parser.push("[download] Destination: downloads/Channel/video.mp4");
        assert!(events.is_empty());
        assert_eq!(parser.destination(), Some("downloads/Channel/video.mp4"));
    }

    #[test]
    fn test_progress_line_with_at_speed() {
        let mut parser = ProgressParser::new();
        let events =
            parser.push("[download]  45.2% of 100.00MiB at 5.23MiB/s ETA 00:30");
        assert_eq!(
            events,
            vec![ProgressEvent::Downloading {
                percent: 45.2,
                speed: Some("5.23MiB/s".to_string()),
                eta: Some("00:30".to_string()),
            }]
        );
    }

    #[test]
    fn test_progress_line_with_tilde_speed_and_long_eta() {
        let mut parser = ProgressParser::new();
        let events =
            parser.push("[download]  12.0% of ~250.00MiB at ~1.10MiB/s ETA 1:02:03");
        assert_eq!(
            events,
            vec![ProgressEvent::Downloading {
                percent: 12.0,
                speed: Some("1.10MiB/s".to_string()),
                eta: Some("1:02:03".to_string()),
            }]
        );
    }

    #[test]
    fn test_progress_line_without_speed_or_eta() {
        let mut parser = ProgressParser::new();
        let events = parser.push("[download]  33.3% of 10.00MiB");
        assert_eq!(
            events,
            vec![ProgressEvent::Downloading {
                percent: 33.3,
                speed: None,
                eta: None,
            }]
        );
    }

    #[test]
    fn test_stream_reset_on_drop_from_high_to_low() {
        let mut parser = ProgressParser::new();
        parser.push("[download]  95.0% of 100.00MiB at 5.00MiB/s ETA 00:01");
        let events = parser.push("[download]   2.0% of 8.00MiB at 2.00MiB/s ETA 00:04");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ProgressEvent::StreamReset);
        assert_eq!(percents(&events), vec![2.0]);
    }

    #[test]
    fn test_no_reset_on_small_backward_jitter() {
        let mut parser = ProgressParser::new();
        parser.push("[download]  95.0% of 100.00MiB at 5.00MiB/s ETA 00:01");
        let events = parser.push("[download]  94.0% of 100.00MiB at 5.00MiB/s ETA 00:01");
        assert_eq!(events.len(), 1);
        assert_eq!(percents(&events), vec![94.0]);
    }

    #[test]
    fn test_exactly_one_reset_per_high_low_transition() {
        let mut parser = ProgressParser::new();
        let transcript = [
            "[download]  50.0% of 100.00MiB at 5.00MiB/s ETA 00:10",
            "[download]  95.0% of 100.00MiB at 5.00MiB/s ETA 00:01",
            "[download]   1.0% of 8.00MiB at 2.00MiB/s ETA 00:04",
            "[download]  10.0% of 8.00MiB at 2.00MiB/s ETA 00:03",
            "[download]  95.0% of 8.00MiB at 2.00MiB/s ETA 00:00",
            "[download]   3.0% of 2.00MiB at 2.00MiB/s ETA 00:01",
        ];
        let mut resets = 0;
        for line in transcript {
            for event in parser.push(line) {
                if event == ProgressEvent::StreamReset {
                    resets += 1;
                }
            }
        }
        assert_eq!(resets, 2);
    }

    #[test]
    fn test_percent_monotonic_between_resets() {
        let mut parser = ProgressParser::new();
        let transcript = [
            "[download]   5.0% of 100.00MiB at 5.00MiB/s ETA 00:20",
            "[download]  40.0% of 100.00MiB at 5.00MiB/s ETA 00:12",
            "[download]  92.0% of 100.00MiB at 5.00MiB/s ETA 00:02",
            "[download]   1.0% of 8.00MiB at 2.00MiB/s ETA 00:04",
            "[download]  60.0% of 8.00MiB at 2.00MiB/s ETA 00:02",
        ];
        let mut all = Vec::new();
        for line in transcript {
            all.extend(parser.push(line));
        }
        let mut last = -1.0f32;
        for event in &all {
            match event {
                ProgressEvent::StreamReset => last = -1.0,
                ProgressEvent::Downloading { percent, .. } => {
                    assert!(*percent >= last, "{percent} went backward without reset");
                    last = *percent;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_processing_emitted_once_at_completion() {
        let mut parser = ProgressParser::new();
        parser.push("[download]  98.0% of 100.00MiB at 5.00MiB/s ETA 00:01");
        let events = parser.push("[download] 100.0% of 100.00MiB at 5.00MiB/s ETA 00:00");
        assert_eq!(
            events,
            vec![ProgressEvent::Processing {
                step: "Processing...".to_string()
            }]
        );
        // 99-100% churn after that is suppressed entirely
        let events = parser.push("[download] 100.0% of 100.00MiB at 5.00MiB/s ETA 00:00");
        assert!(events.is_empty());
    }

    #[test]
    fn test_downloading_suppressed_until_stream_reset() {
        let mut parser = ProgressParser::new();
        parser.push("[download] 100.0% of 100.00MiB at 5.00MiB/s ETA 00:00");
        assert!(parser
            .push("[download]  99.5% of 100.00MiB at 5.00MiB/s ETA 00:00")
            .is_empty());

        // A reset re-enables Downloading events
        let events = parser.push("[download]   4.0% of 8.00MiB at 2.00MiB/s ETA 00:04");
        assert_eq!(events[0], ProgressEvent::StreamReset);
        assert_eq!(percents(&events), vec![4.0]);
    }

    #[test]
    fn test_postprocessor_tags_map_to_steps() {
        let cases = [
            ("[Merger] Merging formats into \"v.mp4\"", "Merging video and audio"),
            ("[ExtractAudio] Destination: v.mp3", "Extracting audio"),
            ("[Metadata] Adding metadata to \"v.mp4\"", "Embedding metadata"),
            ("[EmbedThumbnail] ffmpeg: Adding thumbnail", "Embedding thumbnail"),
            ("[EmbedSubtitle] Embedding subtitles", "Embedding subtitles"),
            ("[VideoRemuxer] Remuxing video", "Remuxing video"),
            ("[MoveFiles] Moving file", "Moving files"),
            ("[ModifyChapters] Removing chapters", "Processing chapters"),
            ("[VideoConvertor] Converting video", "Converting video format"),
            ("[SponsorBlock] Found 2 segments", "Processing sponsor segments"),
        ];
        for (line, step) in cases {
            let mut parser = ProgressParser::new();
            let events = parser.push(line);
            assert_eq!(
                events,
                vec![ProgressEvent::Processing {
                    step: step.to_string()
                }],
                "line: {line}"
            );
        }
    }

    #[test]
    fn test_postprocessor_tag_sets_suppression() {
        let mut parser = ProgressParser::new();
        parser.push("[Merger] Merging formats into \"v.mp4\"");
        assert!(parser
            .push("[download]  99.0% of 100.00MiB at 5.00MiB/s ETA 00:00")
            .is_empty());
    }

    #[test]
    fn test_bare_path_line_captured_as_final_path() {
        let mut parser = ProgressParser::new();
        let events = parser.push("downloads/Channel/20240101_video.mp4");
        assert!(events.is_empty());
        assert_eq!(
            parser.final_path(),
            Some("downloads/Channel/20240101_video.mp4")
        );
    }

    #[test]
    fn test_existing_file_with_percent_sign_still_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100% legit.mp4");
        std::fs::write(&path, b"x").unwrap();

        let mut parser = ProgressParser::new();
        let line = path.to_string_lossy().to_string();
        parser.push(&line);
        assert_eq!(parser.final_path(), Some(line.as_str()));
    }

    #[test]
    fn test_unrecognized_lines_are_ignored() {
        let mut parser = ProgressParser::new();
        for line in [
            "[youtube] abc123: Downloading webpage",
            "WARNING: something odd happened",
            "plain text with no structure",
            "",
            "   ",
            "[download] 100% marker but no bracket percent pair %%%",
        ] {
            // just must not panic; events from the last line are fine
            let _ = parser.push(line);
        }
    }
}
