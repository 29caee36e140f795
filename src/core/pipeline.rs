use crate::core::config::ExtractionConfig;
use crate::core::frame_source::{frames, open_source, FrameSource};
use crate::core::landmark_provider::{build_provider, LandmarkProvider};
use crate::core::sequence_builder::PoseSequenceBuilder;
use crate::core::sequence_codec;
use crate::models::pose::{ExtractionSummary, PoseError, PoseResult, PoseSequence};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

// ==============================================================================
// Pipeline State
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    Extracting,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Opening => "opening",
            PipelineState::Extracting => "extracting",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

// ==============================================================================
// Extraction Pipeline
// ==============================================================================

/// Video file in, pose JSON out.
///
/// Frames are decoded, run through the landmark provider and appended to the
/// sequence strictly one after another. Frames without a detection are kept
/// with empty landmarks. Output is written to a temp file next to the target
/// and renamed into place, so a failed run never leaves a partial file.
pub struct ExtractionPipeline {
    provider: Box<dyn LandmarkProvider>,
    config: ExtractionConfig,
    state: PipelineState,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExtractionPipeline {
    pub fn new(provider: Box<dyn LandmarkProvider>, config: ExtractionConfig) -> Self {
        Self {
            provider,
            config,
            state: PipelineState::Idle,
            cancel: None,
        }
    }

    /// Build the provider from `config.backend` and wrap it in a pipeline
    pub fn from_config(config: ExtractionConfig) -> PoseResult<Self> {
        config.validate()?;
        let provider = build_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    /// Abort the run (with `Cancelled`) once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn provider_name(&self) -> String {
        self.provider.name()
    }

    /// Open `video_path`, extract every frame and write the sequence to `output_path`
    pub fn run(&mut self, video_path: &Path, output_path: &Path) -> PoseResult<ExtractionSummary> {
        let started = Instant::now();
        info!(
            video = %video_path.display(),
            output = %output_path.display(),
            backend = %self.provider.name(),
            "starting pose extraction"
        );

        self.transition(PipelineState::Opening);
        let result = open_source(video_path, &self.config)
            .and_then(|source| self.run_stages(source, &source_id(video_path), output_path));
        self.complete(result, started)
    }

    /// Run the pipeline on an already opened source.
    ///
    /// The source is closed before this returns, whatever the outcome.
    pub fn run_source(
        &mut self,
        source: Box<dyn FrameSource>,
        source_id: &str,
        output_path: &Path,
    ) -> PoseResult<ExtractionSummary> {
        let started = Instant::now();
        info!(
            source = %source.describe(),
            output = %output_path.display(),
            backend = %self.provider.name(),
            "starting pose extraction"
        );

        let result = self.run_stages(source, source_id, output_path);
        self.complete(result, started)
    }

    fn complete(
        &mut self,
        result: PoseResult<ExtractionSummary>,
        started: Instant,
    ) -> PoseResult<ExtractionSummary> {
        match result {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    frames = summary.frame_count,
                    detected = summary.detected_frames,
                    empty = summary.empty_frames,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "pose extraction finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.transition(PipelineState::Failed);
                error!(error = %e, "pose extraction failed");
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        mut source: Box<dyn FrameSource>,
        source_id: &str,
        output_path: &Path,
    ) -> PoseResult<ExtractionSummary> {
        self.transition(PipelineState::Extracting);
        let extracted = self.extract(source.as_mut(), source_id);
        source.close();
        let sequence = extracted?;

        self.transition(PipelineState::Finalizing);
        let bytes = if self.config.pretty_output {
            sequence_codec::encode(&sequence)?
        } else {
            sequence_codec::encode_compact(&sequence)?
        };
        write_atomically(output_path, &bytes)?;

        let detected_frames = sequence.detected_frames();
        Ok(ExtractionSummary {
            source: sequence.source().to_string(),
            frame_count: sequence.frame_count(),
            detected_frames,
            empty_frames: sequence.frame_count() - detected_frames,
            duration_s: sequence.duration_s(),
            frame_rate: sequence.frame_rate(),
            output_location: output_path.to_path_buf(),
        })
    }

    fn extract(&mut self, source: &mut dyn FrameSource, source_id: &str) -> PoseResult<PoseSequence> {
        let frame_rate = source.frame_rate();
        let mut builder = PoseSequenceBuilder::start(source_id, frame_rate)?
            .with_num_keypoints(self.config.num_keypoints);

        for frame in frames(source) {
            let frame = frame?;

            if self.is_cancelled() {
                return Err(PoseError::Cancelled {
                    frame_index: frame.frame_index,
                });
            }

            let landmarks = self.provider.process(&frame, frame_rate);
            debug!(frame = frame.frame_index, landmarks = landmarks.len(), "frame processed");
            builder.append(frame.frame_index, landmarks)?;
        }

        Ok(builder.finish())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = self.state.as_str(), to = next.as_str(), "pipeline state");
        self.state = next;
    }
}

/// Identifier stored in the sequence: the input's file name
fn source_id(video_path: &Path) -> String {
    video_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_path.display().to_string())
}

/// Write via a temp file in the target directory, then rename over `path`
pub fn write_atomically(path: &Path, bytes: &[u8]) -> PoseResult<()> {
    let write_failure = |source| PoseError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_failure)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(write_failure)?;
    temp.write_all(bytes).map_err(write_failure)?;
    temp.as_file().sync_all().map_err(write_failure)?;
    temp.persist(path).map_err(|e| write_failure(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synthetic::SyntheticBackend;
    use crate::models::frame::{PixelFormat, RawFrame};
    use crate::models::pose::Keypoint;
    use std::sync::atomic::AtomicUsize;

    /// Yields `total` tiny frames and counts `close` calls
    struct ClosingSource {
        total: u64,
        next_index: u64,
        fail_at: Option<u64>,
        closes: Arc<AtomicUsize>,
    }

    impl ClosingSource {
        fn boxed(total: u64, fail_at: Option<u64>) -> (Box<dyn FrameSource>, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let source = ClosingSource {
                total,
                next_index: 0,
                fail_at,
                closes: closes.clone(),
            };
            (Box::new(source), closes)
        }
    }

    impl FrameSource for ClosingSource {
        fn frame_rate(&self) -> f64 {
            30.0
        }

        fn next_frame(&mut self) -> PoseResult<Option<RawFrame>> {
            if Some(self.next_index) == self.fail_at {
                return Err(PoseError::UnreadableContainer {
                    path: "closing".into(),
                    reason: "decode error".to_string(),
                });
            }
            if self.next_index == self.total {
                return Ok(None);
            }
            let frame_index = self.next_index;
            self.next_index += 1;
            Ok(Some(RawFrame {
                frame_index,
                width: 1,
                height: 1,
                data: vec![0, 0, 0],
                format: PixelFormat::RGB24,
            }))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "closing".to_string()
        }
    }

    /// Reports a landmark id outside the topology
    struct OutOfRangeProvider;

    impl LandmarkProvider for OutOfRangeProvider {
        fn process(&mut self, _frame: &RawFrame, _frame_rate: f64) -> Vec<Keypoint> {
            vec![Keypoint::new(99, 0.5, 0.5, 0.0, 1.0)]
        }

        fn name(&self) -> String {
            "out-of-range".to_string()
        }
    }

    fn synthetic() -> ExtractionPipeline {
        ExtractionPipeline::new(Box::new(SyntheticBackend::new(33)), ExtractionConfig::default())
    }

    #[test]
    fn test_source_closed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let (source, closes) = ClosingSource::boxed(5, None);

        let mut pipeline = synthetic();
        let summary = pipeline.run_source(source, "clip", &output).unwrap();
        assert_eq!(summary.frame_count, 5);
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_closed_after_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let (source, closes) = ClosingSource::boxed(5, Some(2));

        let mut pipeline = synthetic();
        let err = pipeline.run_source(source, "clip", &output).unwrap_err();
        assert!(matches!(err, PoseError::UnreadableContainer { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_source_closed_after_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let (source, closes) = ClosingSource::boxed(5, None);

        let mut pipeline = synthetic().with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let err = pipeline.run_source(source, "clip", &output).unwrap_err();
        assert!(matches!(err, PoseError::Cancelled { frame_index: 0 }));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_source_closed_after_invalid_landmark() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let (source, closes) = ClosingSource::boxed(5, None);

        let mut pipeline =
            ExtractionPipeline::new(Box::new(OutOfRangeProvider), ExtractionConfig::default());
        let err = pipeline.run_source(source, "clip", &output).unwrap_err();
        assert!(matches!(err, PoseError::InvalidLandmark { frame_index: 0, .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!output.exists());
    }

    #[test]
    fn test_source_closed_after_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let (source, closes) = ClosingSource::boxed(3, None);

        let mut pipeline = synthetic();
        let err = pipeline
            .run_source(source, "clip", &blocker.join("out.json"))
            .unwrap_err();
        assert!(matches!(err, PoseError::WriteFailure { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_id_is_file_name() {
        assert_eq!(source_id(Path::new("/videos/salsa.mp4")), "salsa.mp4");
        assert_eq!(source_id(Path::new("frames")), "frames");
    }

    #[test]
    fn test_missing_input_fails_in_opening() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let mut pipeline = ExtractionPipeline::new(
            Box::new(SyntheticBackend::new(33)),
            ExtractionConfig::default(),
        );
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let err = pipeline.run(&dir.path().join("missing.y4m"), &output).unwrap_err();
        assert!(matches!(err, PoseError::NotFound { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(!output.exists());
    }

    #[test]
    fn test_write_atomically_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("pose.json");

        write_atomically(&path, b"first").unwrap();
        write_atomically(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_atomically_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let target = blocker.join("pose.json");
        match write_atomically(&target, b"{}") {
            Err(PoseError::WriteFailure { path, .. }) => assert_eq!(path, target),
            other => panic!("expected WriteFailure, got {:?}", other),
        }
    }
}
