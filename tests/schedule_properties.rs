//! Property tests for frame allocation, fade-in and aspect fitting.

use proptest::prelude::*;
use std::time::Duration;

use storyreel::renderer::{fade_opacity, fit_contain};
use storyreel::schedule::{distribute_frames, Schedule, TimingConfig, DEFAULT_FPS};

proptest! {
    #[test]
    fn allocations_sum_to_requested_total(total in 0u64..10_000, scenes in 1usize..200) {
        let split = distribute_frames(total, scenes);
        prop_assert_eq!(split.len(), scenes);
        prop_assert_eq!(split.iter().sum::<u64>(), total);
    }

    #[test]
    fn remainder_goes_to_leading_scenes(total in 0u64..10_000, scenes in 1usize..200) {
        let split = distribute_frames(total, scenes);
        let base = total / scenes as u64;
        let extra = (total % scenes as u64) as usize;
        for (i, frames) in split.iter().enumerate() {
            let expected = if i < extra { base + 1 } else { base };
            prop_assert_eq!(*frames, expected);
        }
        // Non-increasing, and no two scenes differ by more than one frame
        prop_assert!(split.windows(2).all(|w| w[0] >= w[1]));
        prop_assert!(split[0] - split[scenes - 1] <= 1);
    }

    #[test]
    fn frame_rate_plan_matches_budget(total in 1u64..3_000, fps in 1u32..120, scenes in 1usize..50) {
        let cfg = TimingConfig::FrameRate { total_frames: total, fps };
        let schedule = Schedule::plan(scenes, &cfg, DEFAULT_FPS).unwrap();
        prop_assert_eq!(schedule.frame_count(), total);
        prop_assert_eq!(schedule.total_frames(), Some(total));

        let expected = Duration::from_nanos((total as u128 * 1_000_000_000 / fps as u128) as u64);
        prop_assert_eq!(schedule.playback_duration(), expected);
    }

    #[test]
    fn fixed_length_plan_spans_requested_seconds(total in 1u64..3_000, millis in 1u64..600_000, scenes in 1usize..50) {
        let cfg = TimingConfig::FixedLength { total_frames: total, total_seconds: millis as f64 / 1000.0 };
        let schedule = Schedule::plan(scenes, &cfg, DEFAULT_FPS).unwrap();
        prop_assert_eq!(schedule.frame_count(), total);
        prop_assert_eq!(schedule.playback_duration(), Duration::from_millis(millis));
    }

    #[test]
    fn per_scene_plan_is_uniform(tenths in 1u64..600, scenes in 1usize..50) {
        let cfg = TimingConfig::PerScene { seconds_per_scene: tenths as f64 / 10.0 };
        let schedule = Schedule::plan(scenes, &cfg, DEFAULT_FPS).unwrap();
        let first = schedule.scene_frames()[0];
        prop_assert!(first >= 1);
        prop_assert!(schedule.scene_frames().iter().all(|&f| f == first));
        prop_assert_eq!(schedule.total_frames(), None);
    }

    #[test]
    fn fade_is_monotonic_and_bounded(scene_frames in 1u64..2_000) {
        let mut previous = 0.0f32;
        for frame in 0..scene_frames {
            let opacity = fade_opacity(frame, scene_frames);
            prop_assert!((0.0..=1.0).contains(&opacity));
            prop_assert!(opacity >= previous);
            previous = opacity;
        }
        prop_assert_eq!(fade_opacity(0, scene_frames), 0.0);
        prop_assert_eq!(fade_opacity(scene_frames, scene_frames), 1.0);
    }

    #[test]
    fn fit_stays_inside_and_keeps_aspect(iw in 1u32..5_000, ih in 1u32..5_000, sw in 1u32..4_000, sh in 1u32..4_000) {
        let rect = fit_contain(iw, ih, sw, sh);
        let eps = 1e-6;
        prop_assert!(rect.x >= -eps && rect.y >= -eps);
        prop_assert!(rect.x + rect.width <= sw as f64 + eps);
        prop_assert!(rect.y + rect.height <= sh as f64 + eps);

        // Touches both edges along one axis
        let fills_width = (rect.width - sw as f64).abs() < eps;
        let fills_height = (rect.height - sh as f64).abs() < eps;
        prop_assert!(fills_width || fills_height);

        // Centered
        prop_assert!((rect.x * 2.0 + rect.width - sw as f64).abs() < 1e-6 * sw as f64 + eps);
        prop_assert!((rect.y * 2.0 + rect.height - sh as f64).abs() < 1e-6 * sh as f64 + eps);

        let aspect = iw as f64 / ih as f64;
        prop_assert!((rect.width / rect.height - aspect).abs() <= aspect * 1e-9);
    }
}

#[test]
fn documented_splits() {
    assert_eq!(distribute_frames(10, 3), vec![4, 3, 3]);
    assert_eq!(distribute_frames(3, 5), vec![1, 1, 1, 0, 0]);
    assert_eq!(distribute_frames(30, 5), vec![6, 6, 6, 6, 6]);
}
