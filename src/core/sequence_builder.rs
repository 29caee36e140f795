use crate::models::pose::{
    check_landmarks, frame_timestamp_ms, Keypoint, PoseError, PoseFrame, PoseResult, PoseSequence,
};

/// Accumulates per-frame landmarks into a [`PoseSequence`].
///
/// Frames must arrive with consecutive indices starting at 0. Landmark sets
/// are validated on `append`, so `finish` always yields a well-formed sequence.
#[derive(Debug)]
pub struct PoseSequenceBuilder {
    source: String,
    frame_rate: f64,
    num_keypoints: usize,
    frames: Vec<PoseFrame>,
}

impl PoseSequenceBuilder {
    pub fn start(source_id: impl Into<String>, frame_rate: f64) -> PoseResult<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid frame rate: {}. Must be a positive number",
                frame_rate
            )));
        }

        Ok(Self {
            source: source_id.into(),
            frame_rate,
            num_keypoints: crate::models::pose::NUM_KEYPOINTS,
            frames: Vec::new(),
        })
    }

    /// Validate landmarks against a topology other than the 33-point default
    pub fn with_num_keypoints(mut self, num_keypoints: usize) -> Self {
        self.num_keypoints = num_keypoints;
        self
    }

    /// Index the next `append` must carry
    pub fn expected_index(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn append(&mut self, frame_index: u64, landmarks: Vec<Keypoint>) -> PoseResult<()> {
        let expected = self.expected_index();
        if frame_index != expected {
            return Err(PoseError::OutOfOrderFrame {
                expected,
                found: frame_index,
            });
        }

        check_landmarks(&landmarks, self.num_keypoints)
            .map_err(|reason| PoseError::InvalidLandmark {
                frame_index,
                reason,
            })?;

        self.frames.push(PoseFrame {
            frame_index,
            timestamp_ms: frame_timestamp_ms(frame_index, self.frame_rate),
            landmarks,
        });
        Ok(())
    }

    pub fn finish(self) -> PoseSequence {
        let duration_s = self.frames.len() as f64 / self.frame_rate;
        PoseSequence::from_parts(self.source, duration_s, self.frame_rate, self.frames)
    }
}
