//! One-shot CLI: reads a local FLV file, feeds it through [`FlvDemuxer`] in
//! arbitrarily sized chunks (to exercise the partial-input path on every
//! run), then prints the consolidated `MediaInfo` plus per-track counters.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use flvprobe::codec_strings::{avc1_codec_string, AAC_CODEC_STRING, MP3_CODEC_STRING};
use flvprobe::media_info::AudioCodec;
use flvprobe::{Callbacks, DemuxError, FlvDemuxer, MediaInfo};

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const BRIGHT_GREEN: &str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &str = "\x1b[93m";
    pub const BRIGHT_CYAN: &str = "\x1b[96m";
    pub const BRIGHT_RED: &str = "\x1b[91m";
}
use colors::*;

#[derive(Parser, Debug)]
#[command(name = "flvprobe", about = "FLV media-info probe")]
struct Args {
    /// Path to a local .flv file
    path: PathBuf,

    /// Chunk size (bytes) the file is split into before feeding the demuxer
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let data = match std::fs::read(&args.path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{BRIGHT_RED}failed to read {}: {e}{RESET}", args.path.display());
            std::process::exit(1);
        }
    };

    let audio_frames = Rc::new(Cell::new(0u64));
    let video_frames = Rc::new(Cell::new(0u64));
    let audio_frames2 = audio_frames.clone();
    let video_frames2 = video_frames.clone();

    let last_info: Rc<std::cell::RefCell<Option<MediaInfo>>> = Rc::new(std::cell::RefCell::new(None));
    let last_info2 = last_info.clone();

    let callbacks = Callbacks::new()
        .with_on_data(move |track, bytes, _pts, _dts| {
            let _ = bytes.len();
            match track.kind {
                flvprobe::TrackKind::Audio => audio_frames2.set(audio_frames2.get() + 1),
                flvprobe::TrackKind::Video => video_frames2.set(video_frames2.get() + 1),
            }
        })
        .with_on_media_info(move |info| {
            *last_info2.borrow_mut() = Some(info.clone());
        });

    let mut demux = FlvDemuxer::new(callbacks);

    let mut start = 0usize;
    let mut end = 0usize;
    loop {
        if end < data.len() {
            end = (end + args.chunk_size).min(data.len());
        }
        loop {
            match demux.parse_chunks(&data, start, end) {
                Ok(consumed) => {
                    start += consumed;
                    if consumed == 0 || start == end {
                        break;
                    }
                }
                Err(DemuxError::FormatError { reason }) => {
                    eprintln!("{BRIGHT_RED}format error: {reason}{RESET}");
                    std::process::exit(1);
                }
            }
        }
        if end >= data.len() {
            if start < end {
                eprintln!(
                    "{BRIGHT_YELLOW}trailing incomplete tag ({} bytes) ignored{RESET}",
                    end - start
                );
            }
            break;
        }
    }

    print_report(&args.path, &last_info.borrow(), audio_frames.get(), video_frames.get());
}

fn print_report(path: &PathBuf, info: &Option<MediaInfo>, audio_frames: u64, video_frames: u64) {
    println!("{BOLD}{}{RESET}", path.display());
    println!("{DIM}──────────────────────────────────────{RESET}");

    let Some(info) = info else {
        println!("{BRIGHT_YELLOW}no media info was ever dispatched{RESET}");
        return;
    };

    println!(
        "  {DIM}video:{RESET} {}",
        info.video_codec.map(|c| c.as_str()).unwrap_or("-")
    );
    if let (Some(w), Some(h)) = (info.width, info.height) {
        println!("  {DIM}resolution:{RESET} {BRIGHT_GREEN}{w}x{h}{RESET}");
    }
    if let Some(fmt) = info.pix_fmt {
        println!("  {DIM}pix_fmt:{RESET} {}", fmt.as_str());
    }
    if let Some(fps) = info.fps {
        println!("  {DIM}fps:{RESET} {BRIGHT_CYAN}{fps:.2}{RESET}");
    }
    if let Some(p) = info.color_primaries {
        println!(
            "  {DIM}colorimetry:{RESET} primaries={p} transfer={} space={}",
            info.color_transfer.unwrap_or("-"),
            info.color_space.unwrap_or("-")
        );
    }
    println!(
        "  {DIM}audio:{RESET} {}",
        info.audio_codec.map(|c| c.as_str()).unwrap_or("-")
    );
    if let (Some(profile), Some(level)) = (info.profile, info.level) {
        let audio_codec_string = match info.audio_codec {
            Some(AudioCodec::Aac) => Some(AAC_CODEC_STRING),
            Some(AudioCodec::Mp3) => Some(MP3_CODEC_STRING),
            None => None,
        };
        let codec_string = match audio_codec_string {
            Some(audio) => format!("{},{audio}", avc1_codec_string(profile, level)),
            None => avc1_codec_string(profile, level),
        };
        println!("  {DIM}codecs:{RESET} {codec_string}");
    }
    println!("  {DIM}frames:{RESET} video={video_frames} audio={audio_frames}");
}
