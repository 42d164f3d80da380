//! Stance flip detection.
//!
//! Compares chronologically adjacent, non-empty bins of each (voice, topic)
//! series. A missing bin breaks the series: the two sides of a data outage
//! are never compared, so a flip cannot be manufactured out of a gap.

use mindshare_common::{Error, FlipConfig, Result, StanceMeasure, Validate};
use rayon::prelude::*;
use tracing::debug;

use crate::aggregator::group_series;
use crate::types::{FlipDirection, StanceBin, StanceFlipEvent};

/// Flip detector over stance bin series.
#[derive(Debug, Clone)]
pub struct FlipDetector {
    min_magnitude: f64,
    max_gap_bins: u32,
    measure: StanceMeasure,
    parallel: bool,
}

impl FlipDetector {
    pub fn new(config: &FlipConfig) -> Result<Self> {
        config.validate().map_err(Error::from)?;
        Ok(Self {
            min_magnitude: config.min_magnitude,
            max_gap_bins: config.max_gap_bins,
            measure: config.measure,
            parallel: false,
        })
    }

    /// Scan independent series on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn min_magnitude(&self) -> f64 {
        self.min_magnitude
    }

    /// Detect flips across all series. Sorted by (flip_time, voice, topic).
    pub fn detect(&self, bins: &[StanceBin]) -> Vec<StanceFlipEvent> {
        let series: Vec<Vec<&StanceBin>> = group_series(bins).into_values().collect();

        let mut flips: Vec<StanceFlipEvent> = if self.parallel {
            series
                .par_iter()
                .flat_map_iter(|s| self.detect_series(s))
                .collect()
        } else {
            series.iter().flat_map(|s| self.detect_series(s)).collect()
        };

        flips.sort_by(|a, b| {
            a.flip_time
                .cmp(&b.flip_time)
                .then_with(|| a.voice_id.cmp(&b.voice_id))
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });

        debug!(
            series = series.len(),
            flips = flips.len(),
            min_magnitude = self.min_magnitude,
            "Flip detection finished"
        );

        flips
    }

    /// Detect flips in one chronological (voice, topic) series.
    pub fn detect_series(&self, series: &[&StanceBin]) -> Vec<StanceFlipEvent> {
        series
            .iter()
            .filter(|b| b.count > 0)
            .collect::<Vec<_>>()
            .windows(2)
            .filter_map(|pair| self.compare(pair[0], pair[1]))
            .collect()
    }

    fn compare(&self, before: &StanceBin, after: &StanceBin) -> Option<StanceFlipEvent> {
        if before.voice_id != after.voice_id
            || before.topic_id != after.topic_id
            || before.bin_width_secs != after.bin_width_secs
        {
            return None;
        }

        let gap_secs = (after.bin_start - before.bin_start).num_seconds();
        let max_gap_secs = before.bin_width_secs.saturating_mul(i64::from(self.max_gap_bins));
        if gap_secs <= 0 || gap_secs > max_gap_secs {
            return None;
        }

        let stance_before = before.value(self.measure);
        let stance_after = after.value(self.measure);
        let magnitude = (stance_after - stance_before).abs();

        if !magnitude.is_finite() || magnitude < self.min_magnitude {
            return None;
        }

        let direction = if stance_after > stance_before {
            FlipDirection::TowardSupport
        } else {
            FlipDirection::TowardOpposition
        };

        Some(StanceFlipEvent {
            id: format!(
                "flip:{}:{}:{}",
                after.voice_id,
                after.topic_id,
                after.bin_start.timestamp_millis()
            ),
            voice_id: after.voice_id.clone(),
            topic_id: after.topic_id.clone(),
            flip_time: after.bin_start,
            stance_before,
            stance_after,
            magnitude,
            direction,
            sign_reversal: stance_before * stance_after < 0.0,
            supporting_bin_ids: vec![before.id.clone(), after.id.clone()],
        })
    }
}

/// Detect flips with a one-off detector.
pub fn detect_flips(bins: &[StanceBin], config: &FlipConfig) -> Result<Vec<StanceFlipEvent>> {
    Ok(FlipDetector::new(config)?.detect(bins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bin_id;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn bin(voice: &str, topic: &str, hour: i64, stance: f64) -> StanceBin {
        let start = t0() + Duration::hours(hour);
        StanceBin {
            id: bin_id(voice, topic, start),
            voice_id: voice.into(),
            topic_id: topic.into(),
            bin_start: start,
            bin_width_secs: 3600,
            mean_stance: stance,
            count: 1,
            weighted_mean: stance,
            weighted_fallback: false,
        }
    }

    fn config(min_magnitude: f64) -> FlipConfig {
        FlipConfig {
            min_magnitude,
            ..FlipConfig::default()
        }
    }

    #[test]
    fn test_single_flip_scenario() {
        let bins = vec![bin("v", "t", 0, 0.8), bin("v", "t", 1, 0.75), bin("v", "t", 2, -0.6)];
        let flips = detect_flips(&bins, &config(0.5)).unwrap();

        assert_eq!(flips.len(), 1);
        let flip = &flips[0];
        assert_eq!(flip.flip_time, t0() + Duration::hours(2));
        assert_eq!(flip.stance_before, 0.75);
        assert_eq!(flip.stance_after, -0.6);
        assert!((flip.magnitude - 1.35).abs() < 1e-9);
        assert_eq!(flip.direction, FlipDirection::TowardOpposition);
        assert!(flip.sign_reversal);
        assert_eq!(flip.supporting_bin_ids, vec![bins[1].id.clone(), bins[2].id.clone()]);
    }

    #[test]
    fn test_gap_is_not_bridged() {
        let bins = vec![bin("v", "t", 0, 0.9), bin("v", "t", 2, -0.9)];
        assert!(detect_flips(&bins, &config(0.5)).unwrap().is_empty());

        let bridging = FlipConfig {
            max_gap_bins: 2,
            ..config(0.5)
        };
        assert_eq!(detect_flips(&bins, &bridging).unwrap().len(), 1);
    }

    #[test]
    fn test_topics_are_independent() {
        let bins = vec![
            bin("v", "a", 0, 0.9),
            bin("v", "a", 1, -0.9),
            bin("v", "b", 0, -0.5),
            bin("v", "b", 1, 0.5),
        ];
        let flips = detect_flips(&bins, &config(0.5)).unwrap();
        assert_eq!(flips.len(), 2);
        assert_eq!(flips[0].topic_id, "a");
        assert_eq!(flips[1].topic_id, "b");
        assert_eq!(flips[1].direction, FlipDirection::TowardSupport);
        assert_eq!(flips[0].flip_time, flips[1].flip_time);
    }

    #[test]
    fn test_magnitude_without_sign_reversal() {
        let bins = vec![bin("v", "t", 0, 0.1), bin("v", "t", 1, 0.9)];
        let flips = detect_flips(&bins, &config(0.5)).unwrap();
        assert_eq!(flips.len(), 1);
        assert!(!flips[0].sign_reversal);
    }

    #[test]
    fn test_measure_selection() {
        let mut before = bin("v", "t", 0, 0.0);
        before.weighted_mean = 0.8;
        let after = bin("v", "t", 1, 0.0);

        let weighted = FlipDetector::new(&config(0.5)).unwrap();
        assert_eq!(weighted.detect(&[before.clone(), after.clone()]).len(), 1);

        let mean = FlipDetector::new(&FlipConfig {
            measure: StanceMeasure::Mean,
            ..config(0.5)
        })
        .unwrap();
        assert!(mean.detect(&[before, after]).is_empty());
    }

    #[test]
    fn test_empty_bins_skipped() {
        let mut empty = bin("v", "t", 1, -0.9);
        empty.count = 0;
        let bins = vec![bin("v", "t", 0, 0.9), empty, bin("v", "t", 2, 0.9)];
        assert!(detect_flips(&bins, &config(0.5)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_threshold_is_config_error() {
        assert!(detect_flips(&[], &config(0.0)).unwrap_err().is_config());
        assert!(detect_flips(&[], &config(-1.0)).unwrap_err().is_config());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let bins: Vec<StanceBin> = (0..20)
            .flat_map(|h| {
                let s = if h % 3 == 0 { 0.9 } else { -0.4 };
                vec![bin("a", "t", h, s), bin("b", "t", h, -s), bin("a", "u", h, s / 2.0)]
            })
            .collect();
        let detector = FlipDetector::new(&config(0.3)).unwrap();
        let sequential = detector.detect(&bins);
        let parallel = detector.clone().with_parallel(true).detect(&bins);
        assert!(!sequential.is_empty());
        assert_eq!(sequential, parallel);
    }

    proptest! {
        #[test]
        fn prop_raising_threshold_never_adds_flips(
            stances in proptest::collection::vec(-1.0f64..=1.0, 0..30),
            low in 0.01f64..1.0,
            extra in 0.0f64..1.0,
        ) {
            let bins: Vec<StanceBin> = stances
                .iter()
                .enumerate()
                .map(|(h, s)| bin("v", "t", h as i64, *s))
                .collect();
            let n_low = detect_flips(&bins, &config(low)).unwrap().len();
            let n_high = detect_flips(&bins, &config(low + extra)).unwrap().len();
            prop_assert!(n_high <= n_low);
            prop_assert!(n_low <= bins.len().saturating_sub(1));
        }
    }
}
