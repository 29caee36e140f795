mod common;

use common::write_y4m;
use dance_pose::core::synthetic::SyntheticBackend;
use dance_pose::models::frame::RawFrame;
use dance_pose::{
    decode, extract_batch, ExtractionConfig, ExtractionJob, ExtractionPipeline, Keypoint,
    LandmarkProvider, PipelineState, PoseError, PoseResult, NUM_KEYPOINTS,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn synthetic_pipeline(config: ExtractionConfig) -> ExtractionPipeline {
    ExtractionPipeline::new(Box::new(SyntheticBackend::new(config.num_keypoints)), config)
}

/// Synthetic landmarks except on the listed frames, which come back empty
struct FlakyDetector {
    inner: SyntheticBackend,
    misses: Vec<u64>,
}

impl LandmarkProvider for FlakyDetector {
    fn process(&mut self, frame: &RawFrame, frame_rate: f64) -> Vec<Keypoint> {
        if self.misses.contains(&frame.frame_index) {
            return vec![];
        }
        self.inner.process(frame, frame_rate)
    }

    fn name(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn two_seconds_at_thirty_fps() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "routine.y4m", 60, 30, 1);
    let output = dir.path().join("poses").join("routine.json");

    let mut pipeline = synthetic_pipeline(ExtractionConfig::default());
    let summary = pipeline.run(&video, &output).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.source, "routine.y4m");
    assert_eq!(summary.frame_count, 60);
    assert_eq!(summary.detected_frames, 60);
    assert_eq!(summary.empty_frames, 0);
    assert_eq!(summary.frame_rate, 30.0);
    assert!((summary.duration_s - 2.0).abs() < 1e-9);
    assert_eq!(summary.output_location, output);

    let sequence = decode(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(sequence.frame_count(), 60);
    assert!((sequence.duration_s() - 2.0).abs() < 1.0 / 30.0);
    for (i, frame) in sequence.frames().iter().enumerate() {
        assert_eq!(frame.frame_index, i as u64);
        assert_eq!(frame.landmarks.len(), NUM_KEYPOINTS);
        for kp in &frame.landmarks {
            assert!((0.0..=1.0).contains(&kp.x));
            assert!((0.0..=1.0).contains(&kp.y));
        }
    }
}

#[test]
fn repeated_runs_write_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 15, 30000, 1001);
    let first = dir.path().join("a.json");
    let second = dir.path().join("b.json");

    synthetic_pipeline(ExtractionConfig::default()).run(&video, &first).unwrap();
    synthetic_pipeline(ExtractionConfig::default()).run(&video, &second).unwrap();

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn missed_detections_keep_their_frames() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 10, 30, 1);
    let output = dir.path().join("clip.json");

    let provider = FlakyDetector {
        inner: SyntheticBackend::new(NUM_KEYPOINTS),
        misses: vec![3, 7],
    };
    let summary = ExtractionPipeline::new(Box::new(provider), ExtractionConfig::default())
        .run(&video, &output)
        .unwrap();
    assert_eq!(summary.frame_count, 10);
    assert_eq!(summary.empty_frames, 2);

    let sequence = decode(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(sequence.frame_count(), 10);
    for frame in sequence.frames() {
        let expect_empty = frame.frame_index == 3 || frame.frame_index == 7;
        assert_eq!(frame.landmarks.is_empty(), expect_empty, "frame {}", frame.frame_index);
    }
}

#[test]
fn missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");

    let mut pipeline = synthetic_pipeline(ExtractionConfig::default());
    let err = pipeline.run(&dir.path().join("nope.y4m"), &output).unwrap_err();

    assert!(matches!(err, PoseError::NotFound { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(!output.exists());
}

#[test]
fn cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 5, 30, 1);
    let output = dir.path().join("out.json");

    let mut pipeline = synthetic_pipeline(ExtractionConfig::default())
        .with_cancel_flag(Arc::new(AtomicBool::new(true)));
    let err = pipeline.run(&video, &output).unwrap_err();

    assert!(matches!(err, PoseError::Cancelled { frame_index: 0 }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(!output.exists());
}

#[test]
fn unwritable_output_is_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 3, 30, 1);
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let mut pipeline = synthetic_pipeline(ExtractionConfig::default());
    let err = pipeline.run(&video, &blocker.join("out.json")).unwrap_err();

    assert!(matches!(err, PoseError::WriteFailure { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn corrupt_container_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("broken.y4m");
    std::fs::write(&video, b"this is not a y4m stream\n").unwrap();
    let output = dir.path().join("out.json");

    let err = synthetic_pipeline(ExtractionConfig::default())
        .run(&video, &output)
        .unwrap_err();
    assert!(matches!(err, PoseError::UnreadableContainer { .. }));
    assert!(!output.exists());
}

#[test]
fn image_directory_uses_configured_rate() {
    let dir = tempfile::tempdir().unwrap();
    let frames_dir = dir.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();
    for i in 0..4 {
        image::RgbImage::from_pixel(6, 4, image::Rgb([i * 40, 90, 200]))
            .save(frames_dir.join(format!("frame_{:03}.png", i)))
            .unwrap();
    }
    let output = dir.path().join("frames.json");

    let config = ExtractionConfig {
        image_sequence_fps: 12.0,
        pretty_output: false,
        ..Default::default()
    };
    let summary = synthetic_pipeline(config).run(&frames_dir, &output).unwrap();

    assert_eq!(summary.source, "frames");
    assert_eq!(summary.frame_count, 4);
    assert_eq!(summary.frame_rate, 12.0);

    let bytes = std::fs::read(&output).unwrap();
    assert!(!bytes.contains(&b'\n'));
    let sequence = decode(&bytes).unwrap();
    assert_eq!(sequence.frames()[1].timestamp_ms, 83);
}

#[test]
fn custom_topology_flows_through() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 4, 25, 1);
    let output = dir.path().join("clip.json");

    let config = ExtractionConfig {
        num_keypoints: 17,
        ..Default::default()
    };
    synthetic_pipeline(config).run(&video, &output).unwrap();

    let bytes = std::fs::read(&output).unwrap();
    let sequence = dance_pose::decode_with(&bytes, 17).unwrap();
    assert!(sequence.frames().iter().all(|f| f.landmarks.len() == 17));
}

#[tokio::test]
async fn batch_runs_jobs_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let lengths = [6usize, 9, 3];
    let jobs: Vec<ExtractionJob> = lengths
        .iter()
        .enumerate()
        .map(|(i, &frames)| {
            let video = write_y4m(dir.path(), &format!("clip{}.y4m", i), frames, 30, 1);
            ExtractionJob::new(video, dir.path().join("out").join(format!("clip{}.json", i)))
        })
        .collect();

    let factory = |config: &ExtractionConfig| -> PoseResult<Box<dyn LandmarkProvider>> {
        Ok(Box::new(SyntheticBackend::new(config.num_keypoints)))
    };
    let results = extract_batch(jobs.clone(), ExtractionConfig::default(), factory)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for ((result, job), frames) in results.into_iter().zip(&jobs).zip(lengths) {
        let summary = result.unwrap();
        assert_eq!(summary.frame_count, frames);
        assert_eq!(summary.output_location, job.output);
        assert!(job.output.exists());
    }
}

#[tokio::test]
async fn batch_factory_errors_stay_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_y4m(dir.path(), "clip.y4m", 2, 30, 1);
    let jobs = vec![ExtractionJob::new(&video, dir.path().join("out.json"))];

    let factory = |_: &ExtractionConfig| -> PoseResult<Box<dyn LandmarkProvider>> {
        Err(PoseError::DetectorUnavailable("no model".to_string()))
    };
    let results = extract_batch(jobs, ExtractionConfig::default(), factory)
        .await
        .unwrap();

    assert!(matches!(results[0], Err(PoseError::DetectorUnavailable(_))));
    assert!(!dir.path().join("out.json").exists());
}
