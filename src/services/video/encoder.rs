use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::errors::{AppError, AppResult};
use crate::models::FrameSize;

/// Частота дискретизации общей дорожки
const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Transition into a segment, already clamped to what the neighbours allow
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// First segment: fade in from black
    FadeFromBlack(f64),
    /// Crossfade with the previous segment, picture and sound overlap by the same amount
    Crossfade(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSegment {
    pub frame_path: PathBuf,
    pub duration_secs: f64,
    /// None when the segment is silent or a narration track is used
    pub audio_path: Option<PathBuf>,
    pub transition: Option<Transition>,
}

/// Everything the encoder needs for one output file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub segments: Vec<JobSegment>,
    pub narration: Option<PathBuf>,
    pub frame_size: FrameSize,
    pub fps: u32,
    pub output: PathBuf,
}

impl ExportJob {
    /// Длительность результата: сумма сегментов минус перекрытия кроссфейдов
    pub fn total_duration(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| match s.transition {
                Some(Transition::Crossfade(t)) => s.duration_secs - t,
                _ => s.duration_secs,
            })
            .sum()
    }
}

/// Media codec / muxer that turns an export job into a file
#[async_trait::async_trait]
pub trait MediaEncoder: Send + Sync {
    async fn export(&self, job: &ExportJob) -> AppResult<()>;
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Builds the `filter_complex` graph. Returns the graph and the labels to map
pub fn build_filter_graph(job: &ExportJob) -> (String, String, String) {
    let FrameSize { width, height } = job.frame_size;
    let n = job.segments.len();
    let mut filters: Vec<String> = Vec::new();

    // Аудиовходы идут после всех кадров, в порядке сегментов
    let mut audio_input = n;

    for (i, segment) in job.segments.iter().enumerate() {
        let mut chain = format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p",
            i = i,
            w = width,
            h = height,
            fps = job.fps
        );
        if let Some(Transition::FadeFromBlack(t)) = segment.transition {
            chain.push_str(&format!(",fade=t=in:st=0:d={:.3}", t));
        }
        chain.push_str(&format!("[v{}]", i));
        filters.push(chain);

        if job.narration.is_none() {
            let d = segment.duration_secs;
            let audio = match segment.audio_path {
                Some(_) => {
                    let f = format!(
                        "[{}:a]aresample={sr},aformat=sample_fmts=fltp:channel_layouts=stereo,apad,atrim=0:{d:.3},asetpts=PTS-STARTPTS[a{i}]",
                        audio_input,
                        sr = OUTPUT_SAMPLE_RATE,
                        d = d,
                        i = i
                    );
                    audio_input += 1;
                    f
                }
                None => format!(
                    "aevalsrc=0:channel_layout=stereo:sample_rate={sr}:duration={d:.3},aformat=sample_fmts=fltp[a{i}]",
                    sr = OUTPUT_SAMPLE_RATE,
                    d = d,
                    i = i
                ),
            };
            filters.push(audio);
        }
    }

    // Сегменты соединяются попарно: xfade/acrossfade при переходе, иначе concat
    let mut video = "v0".to_string();
    let mut audio = "a0".to_string();
    let mut accumulated = job.segments.first().map(|s| s.duration_secs).unwrap_or(0.0);
    for (i, segment) in job.segments.iter().enumerate().skip(1) {
        let out_v = format!("vx{}", i);
        let out_a = format!("ax{}", i);
        match segment.transition {
            Some(Transition::Crossfade(t)) => {
                let offset = (accumulated - t).max(0.0);
                filters.push(format!(
                    "[{}][v{}]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
                    video, i, t, offset, out_v
                ));
                if job.narration.is_none() {
                    filters.push(format!(
                        "[{}][a{}]acrossfade=d={:.3}:c1=tri:c2=tri[{}]",
                        audio, i, t, out_a
                    ));
                }
                accumulated += segment.duration_secs - t;
            }
            _ => {
                filters.push(format!("[{}][v{}]concat=n=2:v=1:a=0[{}]", video, i, out_v));
                if job.narration.is_none() {
                    filters.push(format!("[{}][a{}]concat=n=2:v=0:a=1[{}]", audio, i, out_a));
                }
                accumulated += segment.duration_secs;
            }
        }
        video = out_v;
        audio = out_a;
    }

    if job.narration.is_some() {
        // Единая дорожка озвучки идёт последним входом
        filters.push(format!(
            "[{}:a]aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo[narration]",
            n, OUTPUT_SAMPLE_RATE
        ));
        audio = "narration".to_string();
    }

    (filters.join(";"), format!("[{}]", video), format!("[{}]", audio))
}

/// Full ffmpeg argument list for a job, without the program name
pub fn build_ffmpeg_args(job: &ExportJob) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".to_string(), "-y".to_string()];

    for segment in &job.segments {
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            job.fps.to_string(),
            "-t".to_string(),
            format!("{:.3}", segment.duration_secs),
            "-i".to_string(),
            path_arg(&segment.frame_path),
        ]);
    }

    match &job.narration {
        Some(narration) => args.extend(["-i".to_string(), path_arg(narration)]),
        None => {
            for audio in job.segments.iter().filter_map(|s| s.audio_path.as_ref()) {
                args.extend(["-i".to_string(), path_arg(audio)]);
            }
        }
    }

    let (graph, video, audio) = build_filter_graph(job);
    args.extend([
        "-filter_complex".to_string(),
        graph,
        "-map".to_string(),
        video,
        "-map".to_string(),
        audio,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        job.fps.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(), // Audio bitrate
        "-movflags".to_string(),
        "+faststart".to_string(), // Optimize for streaming
        path_arg(&job.output),
    ]);
    args
}

/// ffmpeg-backed encoder
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait::async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn export(&self, job: &ExportJob) -> AppResult<()> {
        let args = build_ffmpeg_args(job);
        info!(
            "Running ffmpeg for {} segments -> {}",
            job.segments.len(),
            job.output.display()
        );
        debug!("ffmpeg {}", args.join(" "));

        let mut child = TokioCommand::new(&self.ffmpeg)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::ExportError(format!("Failed to start ffmpeg: {}", e)))?;

        // Последние строки stderr нужны для текста ошибки
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail: Vec<String> = Vec::new();
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("ffmpeg: {}", line);
                    if tail.len() == 8 {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
                tail
            })
        });

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(AppError::ExportError(format!(
                    "Error waiting for ffmpeg process: {}",
                    e
                )));
            }
            Err(_) => {
                error!("ffmpeg timed out after {} s", self.timeout.as_secs());
                let _ = child.kill().await;
                return Err(AppError::ExportError(format!(
                    "ffmpeg timed out after {} s",
                    self.timeout.as_secs()
                )));
            }
        };

        let tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            error!("ffmpeg failed with status: {}", status);
            return Err(AppError::ExportError(format!(
                "ffmpeg failed with status {}: {}",
                status,
                tail.join(" | ")
            )));
        }

        info!("ffmpeg finished: {}", job.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(i: u32, duration: f64, audio: bool, transition: Option<Transition>) -> JobSegment {
        JobSegment {
            frame_path: PathBuf::from(format!("frames/Dato1_{}_with_text.png", i)),
            duration_secs: duration,
            audio_path: audio.then(|| PathBuf::from(format!("audio/clip{}.mp3", i))),
            transition,
        }
    }

    fn job(segments: Vec<JobSegment>, narration: Option<PathBuf>) -> ExportJob {
        ExportJob {
            segments,
            narration,
            frame_size: FrameSize::new(1280, 720),
            fps: 24,
            output: PathBuf::from("out/news_video.mp4"),
        }
    }

    #[test]
    fn test_single_segment_maps_its_own_streams() {
        let (graph, video, audio) = build_filter_graph(&job(vec![segment(1, 2.0, true, None)], None));
        assert_eq!(video, "[v0]");
        assert_eq!(audio, "[a0]");
        assert!(graph.contains("[1:a]aresample=44100"));
        assert!(graph.contains("atrim=0:2.000"));
    }

    #[test]
    fn test_crossfade_offsets_accumulate() {
        let j = job(
            vec![
                segment(1, 3.0, true, Some(Transition::FadeFromBlack(0.5))),
                segment(2, 2.0, true, Some(Transition::Crossfade(0.5))),
                segment(3, 4.0, true, Some(Transition::Crossfade(1.0))),
            ],
            None,
        );
        let (graph, video, audio) = build_filter_graph(&j);
        assert!(graph.contains("fade=t=in:st=0:d=0.500[v0]"));
        assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=0.500:offset=2.500[vx1]"));
        assert!(graph.contains("[vx1][v2]xfade=transition=fade:duration=1.000:offset=3.500[vx2]"));
        assert!(graph.contains("[ax1][a2]acrossfade=d=1.000"));
        assert_eq!(video, "[vx2]");
        assert_eq!(audio, "[ax2]");
        assert!((j.total_duration() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_silent_segment_gets_generated_silence() {
        let j = job(vec![segment(1, 2.0, true, None), segment(2, 3.0, false, None)], None);
        let (graph, _, _) = build_filter_graph(&j);
        assert!(graph.contains("aevalsrc=0:channel_layout=stereo:sample_rate=44100:duration=3.000"));
        assert!(graph.contains("[v0][v1]concat=n=2:v=1:a=0[vx1]"));
        assert!(graph.contains("[a0][a1]concat=n=2:v=0:a=1[ax1]"));

        // только один аудиовход
        let args = build_ffmpeg_args(&j);
        assert_eq!(args.iter().filter(|a| a.as_str() == "-i").count(), 3);
    }

    #[test]
    fn test_narration_track_replaces_segment_audio() {
        let j = job(
            vec![segment(1, 2.0, true, None), segment(2, 2.0, true, Some(Transition::Crossfade(0.5)))],
            Some(PathBuf::from("audio/narration.wav")),
        );
        let (graph, _, audio) = build_filter_graph(&j);
        assert_eq!(audio, "[narration]");
        assert!(graph.contains("[2:a]aresample"));
        assert!(!graph.contains("acrossfade"));

        let args = build_ffmpeg_args(&j);
        assert!(args.contains(&"audio/narration.wav".to_string()));
        assert!(!args.contains(&"audio/clip1.mp3".to_string()));
    }

    #[test]
    fn test_args_encode_for_playback() {
        let args = build_ffmpeg_args(&job(vec![segment(1, 1.5, false, None)], None));
        let joined = args.join(" ");
        assert!(joined.starts_with("-hide_banner -y -loop 1 -framerate 24 -t 1.500 -i frames/Dato1_1_with_text.png"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-b:a 192k"));
        assert!(joined.contains("-movflags +faststart"));
        assert_eq!(args.last().unwrap(), "out/news_video.mp4");
    }

    #[tokio::test]
    async fn test_missing_binary_is_export_error() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg", 5);
        let err = encoder
            .export(&job(vec![segment(1, 1.0, false, None)], None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExportError(_)));
    }
}
