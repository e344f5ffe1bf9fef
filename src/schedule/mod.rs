//! Frame scheduling: how many frames (or how much time) each scene gets.
//!
//! Frame budgets are split with `base = total / n` and the first
//! `total % n` scenes getting one extra frame, so the allocations always
//! sum to the requested total. Duration budgets are split evenly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ReelError, ReelResult};

/// Sampling rate used when a timing mode does not name one.
pub const DEFAULT_FPS: u32 = 30;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// The three equivalent ways to describe a render's timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimingConfig {
    /// Fixed frame budget encoded at `fps`.
    FrameRate { total_frames: u64, fps: u32 },

    /// Fixed frame budget stretched over `total_seconds` of playback.
    FixedLength { total_frames: u64, total_seconds: f64 },

    /// Every scene plays for the same wall-clock duration.
    PerScene { seconds_per_scene: f64 },
}

impl TimingConfig {
    pub fn validate(&self) -> ReelResult<()> {
        match *self {
            TimingConfig::FrameRate { fps, .. } => {
                if fps == 0 {
                    return Err(ReelError::precondition("fps must be positive"));
                }
            }
            TimingConfig::FixedLength { total_seconds, .. } => {
                positive_duration(total_seconds, "total playback seconds")?;
            }
            TimingConfig::PerScene { seconds_per_scene } => {
                positive_duration(seconds_per_scene, "seconds per scene")?;
            }
        }
        Ok(())
    }

    /// Total frame budget, known only in the frame-based modes.
    pub fn total_frames(&self) -> Option<u64> {
        match *self {
            TimingConfig::FrameRate { total_frames, .. }
            | TimingConfig::FixedLength { total_frames, .. } => Some(total_frames),
            TimingConfig::PerScene { .. } => None,
        }
    }

    pub fn is_frame_based(&self) -> bool {
        self.total_frames().is_some()
    }

    /// Spacing between consecutive frame boundaries for this mode.
    pub fn spacing(&self, default_fps: u32) -> FrameSpacing {
        match *self {
            TimingConfig::FrameRate { fps, .. } => FrameSpacing::per_second(fps),
            TimingConfig::FixedLength {
                total_frames,
                total_seconds,
            } if total_frames > 0 => FrameSpacing::new(
                (total_seconds * NANOS_PER_SECOND as f64).round() as u64,
                total_frames,
            ),
            _ => FrameSpacing::per_second(default_fps),
        }
    }
}

/// `frames` frame boundaries spread evenly over `span_ns` nanoseconds.
///
/// Offsets are computed from the ratio rather than a rounded per-frame
/// interval, so frame N lands at exactly `N * span / frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpacing {
    span_ns: u64,
    frames: u64,
}

impl FrameSpacing {
    pub fn new(span_ns: u64, frames: u64) -> Self {
        Self {
            span_ns: span_ns.max(1),
            frames: frames.max(1),
        }
    }

    pub fn per_second(fps: u32) -> Self {
        Self::new(NANOS_PER_SECOND, fps as u64)
    }

    /// Offset of frame `index` from the start of the stream.
    pub fn offset(&self, index: u64) -> Duration {
        let nanos = index as u128 * self.span_ns as u128 / self.frames as u128;
        Duration::from_nanos(nanos as u64)
    }

    pub fn interval(&self) -> Duration {
        self.offset(1)
    }

    pub fn fps(&self) -> f64 {
        self.frames as f64 * NANOS_PER_SECOND as f64 / self.span_ns as f64
    }

    /// Seconds per frame as a reduced `(numerator, denominator)` pair.
    pub fn time_base(&self) -> (u64, u64) {
        let num = self.span_ns as u128;
        let den = self.frames as u128 * NANOS_PER_SECOND as u128;
        let g = gcd(num, den);
        ((num / g) as u64, (den / g) as u64)
    }

    /// Number of frames needed to fill `duration` at this spacing.
    pub fn frames_for(&self, duration: Duration) -> u64 {
        if duration.is_zero() {
            return 0;
        }
        let frames = (duration.as_secs_f64() * self.fps()).round() as u64;
        frames.max(1)
    }
}

/// `seconds` as a `Duration`, rejecting values that are not positive or
/// that a `Duration` cannot hold.
fn positive_duration(seconds: f64, what: &str) -> ReelResult<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ReelError::precondition(format!("{} must be positive, got {}", what, seconds)));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| ReelError::precondition(format!("{} is too large, got {}", what, seconds)))
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Budget assigned to one scene, in the unit of the timing mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    Frames(u64),
    Duration(Duration),
}

impl Allocation {
    pub fn frame_count(&self, spacing: &FrameSpacing) -> u64 {
        match *self {
            Allocation::Frames(frames) => frames,
            Allocation::Duration(duration) => spacing.frames_for(duration),
        }
    }
}

/// Split `total` frames across `scene_count` scenes, front-loading the remainder.
pub fn distribute_frames(total: u64, scene_count: usize) -> Vec<u64> {
    if scene_count == 0 {
        return Vec::new();
    }
    let n = scene_count as u64;
    let base = total / n;
    let remainder = total % n;

    (0..n)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Compute each scene's budget for the given timing mode.
pub fn allocate(scene_count: usize, config: &TimingConfig) -> ReelResult<Vec<Allocation>> {
    if scene_count == 0 {
        return Err(ReelError::precondition("at least one scene is required"));
    }
    config.validate()?;

    let allocations = match *config {
        TimingConfig::FrameRate { total_frames, .. }
        | TimingConfig::FixedLength { total_frames, .. } => {
            distribute_frames(total_frames, scene_count)
                .into_iter()
                .map(Allocation::Frames)
                .collect()
        }
        TimingConfig::PerScene { seconds_per_scene } => {
            // Sub-nanosecond durations still get a frame
            let per_scene = positive_duration(seconds_per_scene, "seconds per scene")?.max(Duration::from_nanos(1));
            vec![Allocation::Duration(per_scene); scene_count]
        }
    };

    Ok(allocations)
}

/// A complete frame plan for one render invocation.
#[derive(Debug, Clone)]
pub struct Schedule {
    allocations: Vec<Allocation>,
    scene_frames: Vec<u64>,
    spacing: FrameSpacing,
    total_frames: Option<u64>,
}

impl Schedule {
    pub fn plan(scene_count: usize, config: &TimingConfig, default_fps: u32) -> ReelResult<Self> {
        if default_fps == 0 {
            return Err(ReelError::precondition("default fps must be positive"));
        }
        let allocations = allocate(scene_count, config)?;
        let spacing = config.spacing(default_fps);
        let scene_frames = allocations.iter().map(|a| a.frame_count(&spacing)).collect();

        Ok(Self {
            allocations,
            scene_frames,
            spacing,
            total_frames: config.total_frames(),
        })
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Frames painted for each scene, in scene order.
    pub fn scene_frames(&self) -> &[u64] {
        &self.scene_frames
    }

    pub fn spacing(&self) -> &FrameSpacing {
        &self.spacing
    }

    /// The caller-requested frame total, if the timing mode has one.
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub fn frame_count(&self) -> u64 {
        self.scene_frames.iter().sum()
    }

    pub fn playback_duration(&self) -> Duration {
        self.spacing.offset(self.frame_count())
    }

    pub fn scene_count(&self) -> usize {
        self.allocations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(allocs: &[Allocation]) -> Vec<u64> {
        allocs
            .iter()
            .map(|a| match a {
                Allocation::Frames(n) => *n,
                Allocation::Duration(_) => panic!("expected frame allocation"),
            })
            .collect()
    }

    #[test]
    fn test_remainder_is_front_loaded() {
        let cfg = TimingConfig::FrameRate { total_frames: 10, fps: 30 };
        assert_eq!(frames(&allocate(3, &cfg).unwrap()), vec![4, 3, 3]);
    }

    #[test]
    fn test_fewer_frames_than_scenes() {
        let cfg = TimingConfig::FrameRate { total_frames: 3, fps: 30 };
        assert_eq!(frames(&allocate(5, &cfg).unwrap()), vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_even_split() {
        let cfg = TimingConfig::FrameRate { total_frames: 30, fps: 30 };
        assert_eq!(frames(&allocate(5, &cfg).unwrap()), vec![6, 6, 6, 6, 6]);
    }

    #[test]
    fn test_fixed_length_uses_same_split() {
        let cfg = TimingConfig::FixedLength { total_frames: 7, total_seconds: 2.0 };
        assert_eq!(frames(&allocate(2, &cfg).unwrap()), vec![4, 3]);
    }

    #[test]
    fn test_per_scene_is_uniform() {
        let cfg = TimingConfig::PerScene { seconds_per_scene: 2.0 };
        let allocs = allocate(4, &cfg).unwrap();
        assert_eq!(allocs.len(), 4);
        assert!(allocs
            .iter()
            .all(|a| *a == Allocation::Duration(Duration::from_secs(2))));
    }

    #[test]
    fn test_zero_scenes_rejected() {
        let cfg = TimingConfig::FrameRate { total_frames: 10, fps: 30 };
        assert!(matches!(
            allocate(0, &cfg),
            Err(ReelError::Precondition { .. })
        ));
        let cfg = TimingConfig::PerScene { seconds_per_scene: 1.0 };
        assert!(allocate(0, &cfg).is_err());
    }

    #[test]
    fn test_invalid_timing_rejected() {
        assert!(TimingConfig::FrameRate { total_frames: 10, fps: 0 }.validate().is_err());
        assert!(TimingConfig::FixedLength { total_frames: 10, total_seconds: 0.0 }
            .validate()
            .is_err());
        assert!(TimingConfig::PerScene { seconds_per_scene: -1.0 }.validate().is_err());
        assert!(TimingConfig::PerScene { seconds_per_scene: f64::NAN }.validate().is_err());
    }

    #[test]
    fn test_spacing_offsets_are_exact() {
        let spacing = FrameSpacing::per_second(30);
        assert_eq!(spacing.offset(30), Duration::from_secs(1));
        assert_eq!(spacing.offset(60), Duration::from_secs(2));
        assert_eq!(spacing.interval(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn test_fixed_length_spacing() {
        let cfg = TimingConfig::FixedLength { total_frames: 20, total_seconds: 4.0 };
        let spacing = cfg.spacing(DEFAULT_FPS);
        assert_eq!(spacing.interval(), Duration::from_millis(200));
        assert!((spacing.fps() - 5.0).abs() < 1e-9);
        assert_eq!(spacing.time_base(), (1, 5));
    }

    #[test]
    fn test_per_scene_plan() {
        let cfg = TimingConfig::PerScene { seconds_per_scene: 2.0 };
        let schedule = Schedule::plan(4, &cfg, DEFAULT_FPS).unwrap();
        assert_eq!(schedule.scene_frames(), &[60, 60, 60, 60]);
        assert_eq!(schedule.playback_duration(), Duration::from_secs(8));
        assert_eq!(schedule.total_frames(), None);
    }

    #[test]
    fn test_frame_plan_duration() {
        let cfg = TimingConfig::FrameRate { total_frames: 30, fps: 30 };
        let schedule = Schedule::plan(5, &cfg, DEFAULT_FPS).unwrap();
        assert_eq!(schedule.frame_count(), 30);
        assert_eq!(schedule.playback_duration(), Duration::from_secs(1));
        assert_eq!(schedule.total_frames(), Some(30));
    }

    #[test]
    fn test_frames_for_duration() {
        let spacing = FrameSpacing::per_second(30);
        assert_eq!(spacing.frames_for(Duration::ZERO), 0);
        assert_eq!(spacing.frames_for(Duration::from_millis(1)), 1);
        assert_eq!(spacing.frames_for(Duration::from_millis(500)), 15);
    }

    #[test]
    fn test_tiny_per_scene_duration_gets_one_frame() {
        let cfg = TimingConfig::PerScene { seconds_per_scene: 1e-12 };
        assert!(cfg.validate().is_ok());
        let schedule = Schedule::plan(2, &cfg, DEFAULT_FPS).unwrap();
        assert_eq!(schedule.scene_frames(), &[1, 1]);
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let cfg = TimingConfig::PerScene { seconds_per_scene: 1e30 };
        assert!(matches!(cfg.validate(), Err(ReelError::Precondition { .. })));
        assert!(matches!(allocate(2, &cfg), Err(ReelError::Precondition { .. })));
        assert!(Schedule::plan(2, &cfg, DEFAULT_FPS).is_err());

        let cfg = TimingConfig::FixedLength { total_frames: 10, total_seconds: 1e30 };
        assert!(matches!(cfg.validate(), Err(ReelError::Precondition { .. })));
    }

    #[test]
    fn test_per_scene_frames_round_to_nearest() {
        // 2.01s at 30 fps is 60.3 frames; each scene keeps 60 (2.0s)
        let cfg = TimingConfig::PerScene { seconds_per_scene: 2.01 };
        let schedule = Schedule::plan(3, &cfg, DEFAULT_FPS).unwrap();
        assert_eq!(schedule.scene_frames(), &[60, 60, 60]);
        assert_eq!(schedule.playback_duration(), Duration::from_secs(6));

        // 2.02s is 60.6 frames and rounds up
        let cfg = TimingConfig::PerScene { seconds_per_scene: 2.02 };
        let schedule = Schedule::plan(1, &cfg, DEFAULT_FPS).unwrap();
        assert_eq!(schedule.scene_frames(), &[61]);
    }
}
