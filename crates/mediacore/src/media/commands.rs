//! ffmpeg argument builders, one per job operation.
//!
//! Builders are pure: they only describe the run. Every stream-copy operation
//! gets the copy timeout, every re-encode the transcode timeout.

use std::path::Path;

use super::quality::CompressionQuality;
use super::tool::{FrameGeometry, ToolInvocation};
use crate::core::config::tool::{copy_timeout, metadata_timeout, transcode_timeout};

/// Stamps `text` as title/author on the container and every stream, copying all streams
pub fn metadata_tag(input: &Path, output: &Path, text: &str) -> ToolInvocation {
    ToolInvocation::new("metadata", output, metadata_timeout())
        .arg("-i")
        .arg(input)
        .args(["-map", "0", "-c:s", "copy", "-c:a", "copy", "-c:v", "copy"])
        .arg("-metadata")
        .arg(format!("title={}", text))
        .arg("-metadata")
        .arg(format!("author={}", text))
        .arg("-metadata:s:s")
        .arg(format!("title={}", text))
        .arg("-metadata:s:a")
        .arg(format!("title={}", text))
        .arg("-metadata:s:v")
        .arg(format!("title={}", text))
        .finish()
}

/// Stream-copy cut of `start..end` (seconds). No re-encode.
pub fn trim_copy(input: &Path, output: &Path, start: f64, end: f64) -> ToolInvocation {
    ToolInvocation::new("trim", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .arg("-ss")
        .arg(format_seconds(start))
        .arg("-to")
        .arg(format_seconds(end))
        .args(["-map", "0", "-c", "copy"])
        .finish()
}

/// Scale + fixed bitrate transcode for one catalog entry
pub fn compress(input: &Path, output: &Path, quality: &CompressionQuality) -> ToolInvocation {
    ToolInvocation::new("compress", output, transcode_timeout())
        .arg("-i")
        .arg(input)
        .arg("-vf")
        .arg(format!(
            "scale={}:{}:force_original_aspect_ratio=decrease:force_divisible_by=2",
            quality.width, quality.height
        ))
        .args(["-c:v", "libx264", "-b:v", quality.bitrate])
        .args(["-c:a", "aac", "-b:a", "128k", "-preset", "fast", "-movflags", "+faststart"])
        .finish()
}

/// Container audio as a standalone mp3
pub fn extract_audio(input: &Path, output: &Path) -> ToolInvocation {
    ToolInvocation::new("extract_audio", output, transcode_timeout())
        .arg("-i")
        .arg(input)
        .args(["-vn", "-acodec", "libmp3lame", "-q:a", "2"])
        .finish()
}

/// First subtitle stream as a standalone subtitle file
pub fn extract_subtitle(input: &Path, output: &Path) -> ToolInvocation {
    ToolInvocation::new("extract_subtitle", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .args(["-map", "0:s:0"])
        .finish()
}

/// Which streams a removal job drops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRemoval {
    Audio,
    Subtitles,
    Both,
}

impl StreamRemoval {
    /// Suffix appended to the output stem
    pub fn suffix(self) -> &'static str {
        match self {
            StreamRemoval::Audio => "_no_audio",
            StreamRemoval::Subtitles => "_no_subs",
            StreamRemoval::Both => "_video_only",
        }
    }
}

pub fn remove_streams(input: &Path, output: &Path, removal: StreamRemoval) -> ToolInvocation {
    let inv = ToolInvocation::new("remove_streams", output, copy_timeout())
        .arg("-i")
        .arg(input);
    let inv = match removal {
        StreamRemoval::Audio => inv.args(["-c:v", "copy", "-an"]),
        StreamRemoval::Subtitles => inv.args(["-c:v", "copy", "-c:a", "copy", "-sn"]),
        StreamRemoval::Both => inv.args(["-c:v", "copy", "-an", "-sn"]),
    };
    inv.finish()
}

/// Body of a concat-demuxer list file. Single quotes in paths are escaped.
pub fn concat_list(inputs: &[&Path]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

/// Zero-copy concatenation through the concat demuxer
pub fn concat_copy(list_file: &Path, output: &Path) -> ToolInvocation {
    ToolInvocation::new("concat", output, copy_timeout())
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(list_file)
        .args(["-c", "copy"])
        .finish()
}

/// Filter-graph concatenation, re-encoding every input
pub fn concat_reencode(inputs: &[&Path], output: &Path) -> ToolInvocation {
    let mut inv = ToolInvocation::new("concat_reencode", output, transcode_timeout());
    for input in inputs {
        inv = inv.arg("-i").arg(*input);
    }
    let pads: String = (0..inputs.len()).map(|i| format!("[{i}:v][{i}:a]")).collect();
    inv.arg("-filter_complex")
        .arg(format!("{}concat=n={}:v=1:a=1[outv][outa]", pads, inputs.len()))
        .args(["-map", "[outv]", "-map", "[outa]"])
        .args(["-c:v", "libx264", "-preset", "fast", "-c:a", "aac"])
        .finish()
}

/// Video stream-copied plus every audio input re-encoded to AAC
pub fn mux_audio(video: &Path, audios: &[&Path], output: &Path) -> ToolInvocation {
    mux("mux_audio", video, audios, &[], output).args(["-shortest"]).finish()
}

/// Video and audio stream-copied plus every subtitle input as soft subs
pub fn mux_subtitles(video: &Path, subtitles: &[&Path], output: &Path) -> ToolInvocation {
    mux("mux_subtitles", video, &[], subtitles, output).finish()
}

/// Video stream-copied, extra audio re-encoded, subtitles as soft subs
pub fn mux_all(video: &Path, audios: &[&Path], subtitles: &[&Path], output: &Path) -> ToolInvocation {
    mux("mux_all", video, audios, subtitles, output).finish()
}

fn mux(
    operation: &'static str,
    video: &Path,
    audios: &[&Path],
    subtitles: &[&Path],
    output: &Path,
) -> ToolInvocation {
    let mut inv = ToolInvocation::new(operation, output, transcode_timeout())
        .arg("-i")
        .arg(video);
    for extra in audios.iter().chain(subtitles) {
        inv = inv.arg("-i").arg(*extra);
    }

    inv = inv.args(["-map", "0:v"]);
    if audios.is_empty() {
        inv = inv.args(["-map", "0:a?"]);
    }
    for i in 0..audios.len() {
        inv = inv.arg("-map").arg(format!("{}:a", i + 1));
    }
    for i in 0..subtitles.len() {
        inv = inv.arg("-map").arg(format!("{}", i + 1 + audios.len()));
    }

    inv = inv.args(["-c:v", "copy"]);
    inv = if audios.is_empty() {
        inv.args(["-c:a", "copy"])
    } else {
        inv.args(["-c:a", "aac"])
    };
    if !subtitles.is_empty() {
        inv = inv.args(["-c:s", "srt"]);
    }
    inv
}

/// Stream-copy segment cut used by auto-trim
pub fn segment_copy(input: &Path, output: &Path, start: f64, end: f64) -> ToolInvocation {
    ToolInvocation::new("segment", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .arg("-ss")
        .arg(format_seconds(start))
        .arg("-to")
        .arg(format_seconds(end))
        .args(["-c", "copy", "-avoid_negative_ts", "1"])
        .finish()
}

/// First frame of `input` as raw 8-bit grayscale at the scan geometry
pub fn reference_frame(input: &Path, output: &Path, geometry: FrameGeometry) -> ToolInvocation {
    ToolInvocation::new("reference_frame", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .args(["-frames:v", "1"])
        .arg("-vf")
        .arg(format!("scale={}:{},format=gray", geometry.width, geometry.height))
        .args(["-f", "rawvideo", "-pix_fmt", "gray"])
        .finish()
}

/// Square jpeg thumbnail
pub fn thumbnail(input: &Path, output: &Path) -> ToolInvocation {
    ToolInvocation::new("thumbnail", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .args(["-frames:v", "1", "-vf", "scale=320:320"])
        .finish()
}

/// Square jpeg thumbnail with an `Ep:N` badge in the top right corner
pub fn episode_thumbnail(input: &Path, output: &Path, episode: u32, font: Option<&Path>) -> ToolInvocation {
    let font_opt = font
        .map(|f| format!("fontfile='{}':", escape_filter_value(&f.display().to_string())))
        .unwrap_or_default();
    let drawtext = format!(
        "drawtext={}text='Ep\\:{}':fontcolor=white:fontsize=h/8:box=1:boxcolor=black@0.6:boxborderw=12:x=w-tw-30:y=30",
        font_opt, episode
    );
    ToolInvocation::new("episode_thumbnail", output, copy_timeout())
        .arg("-i")
        .arg(input)
        .arg("-frames:v")
        .arg("1")
        .arg("-vf")
        .arg(format!("{},scale=320:320", drawtext))
        .finish()
}

fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

/// Seconds with millisecond precision, no trailing noise
pub fn format_seconds(seconds: f64) -> String {
    let s = format!("{:.3}", seconds.max(0.0));
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::quality;
    use pretty_assertions::assert_eq;

    fn p(s: &str) -> &Path {
        Path::new(s)
    }

    #[test]
    fn test_trim_is_stream_copy() {
        let inv = trim_copy(p("in.mkv"), p("out.mkv"), 10.0, 75.5);
        assert_eq!(
            inv.args_lossy(),
            vec!["-i", "in.mkv", "-ss", "10", "-to", "75.5", "-map", "0", "-c", "copy", "out.mkv"]
        );
        assert_eq!(inv.operation, "trim");
    }

    #[test]
    fn test_compress_uses_catalog_entry() {
        let q = quality::find("480p").unwrap();
        let args = compress(p("in.mp4"), p("out.mp4"), q).args_lossy();
        assert!(args.contains(&"scale=854:480:force_original_aspect_ratio=decrease:force_divisible_by=2".to_string()));
        assert!(args.windows(2).any(|w| w == ["-b:v", "1000k"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_remove_streams_flags() {
        let args = remove_streams(p("a.mkv"), p("b.mkv"), StreamRemoval::Both).args_lossy();
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"-sn".to_string()));
        assert_eq!(StreamRemoval::Subtitles.suffix(), "_no_subs");
    }

    #[test]
    fn test_mux_all_maps_in_input_order() {
        let inv = mux_all(p("v.mkv"), &[p("a1.m4a"), p("a2.m4a")], &[p("s.srt")], p("out.mkv"));
        let args = inv.args_lossy().join(" ");
        assert_eq!(
            args,
            "-i v.mkv -i a1.m4a -i a2.m4a -i s.srt -map 0:v -map 1:a -map 2:a -map 3 -c:v copy -c:a aac -c:s srt out.mkv"
        );
    }

    #[test]
    fn test_mux_subtitles_keeps_original_audio() {
        let args = mux_subtitles(p("v.mp4"), &[p("s.srt")], p("o.mkv")).args_lossy().join(" ");
        assert_eq!(args, "-i v.mp4 -i s.srt -map 0:v -map 0:a? -map 1 -c:v copy -c:a copy -c:s srt o.mkv");
    }

    #[test]
    fn test_concat_reencode_filter_graph() {
        let args = concat_reencode(&[p("a.mp4"), p("b.mp4")], p("o.mp4")).args_lossy();
        assert!(args.contains(&"[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[outv][outa]".to_string()));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        assert_eq!(
            concat_list(&[p("/tmp/a.mp4"), p("/tmp/it's.mp4")]),
            "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n"
        );
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(5.0), "5");
        assert_eq!(format_seconds(12.25), "12.25");
        assert_eq!(format_seconds(-1.0), "0");
    }

    #[test]
    fn test_episode_thumbnail_badge() {
        let args = episode_thumbnail(p("t.jpg"), p("o.jpg"), 42, None).args_lossy();
        assert!(args.iter().any(|a| a.contains("text='Ep\\:42'")));
    }
}
