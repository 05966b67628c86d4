//! Command-line construction for the external download tool.

use std::process::Stdio;
use tokio::process::Command;

use crate::config::FetcherConfig;
use crate::job::JobOptions;

const AUDIO_FORMATS: &[&str] = &["mp3", "m4a", "opus", "flac", "wav", "aac"];
const VIDEO_FORMATS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi"];

/// Assembles the tool invocation for one job.
///
/// Output is line-oriented: `--newline --no-colors --progress` makes the tool
/// emit one parseable progress line per update, and
/// `--print after_move:filepath` prints the final file path on its own line
/// after all post-processing has moved it into place.
pub fn build_command(config: &FetcherConfig, url: &str, options: &JobOptions) -> Command {
    let mut cmd = Command::new(&config.tool_path);

    cmd.arg("--newline")
        .arg("--no-colors")
        .arg("--progress")
        .arg("-f")
        .arg(&options.format)
        .arg("-o")
        .arg(config.downloads_dir.join(&options.output_template))
        .arg("--no-part")
        .arg("--retries")
        .arg(config.tool_retries.to_string())
        .arg("--print")
        .arg("after_move:filepath");

    if config.cookies_path.exists() {
        cmd.arg("--cookies").arg(&config.cookies_path);
    }

    apply_container(&mut cmd, &options.output_format);

    if options.embed_metadata {
        cmd.arg("--embed-metadata");
    }
    if options.embed_thumbnail {
        cmd.arg("--embed-thumbnail");
    }
    if options.subtitles && !options.subtitle_langs.is_empty() {
        cmd.arg("--write-subs")
            .arg("--sub-langs")
            .arg(options.subtitle_langs.join(","));
    }

    cmd.arg(url);

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

/// Translates the requested container into extraction or remux flags.
///
/// "original" passes the tool's native output through untouched.
fn apply_container(cmd: &mut Command, output_format: &str) {
    let fmt = output_format.to_ascii_lowercase();
    if AUDIO_FORMATS.contains(&fmt.as_str()) {
        cmd.arg("-x")
            .arg("--audio-format")
            .arg(&fmt)
            .arg("--audio-quality")
            .arg("0");
    } else if VIDEO_FORMATS.contains(&fmt.as_str()) {
        cmd.arg("--remux-video").arg(&fmt);
    }
}

/// Renders the argv for logging and tests.
pub fn describe(cmd: &Command) -> Vec<String> {
    let std = cmd.as_std();
    std::iter::once(std.get_program())
        .chain(std.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}
