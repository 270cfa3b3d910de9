//! Simulated probes standing in for real system readings.

use std::fmt;

use rand::Rng;

/// Severity bucket reported to the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Level {
    #[default]
    Normal,
    Elevated,
    High,
    Critical,
}

impl Level {
    /// Bucket `value` against ascending `[elevated, high, critical]`
    /// thresholds.
    pub fn classify(value: f32, thresholds: [f32; 3]) -> Self {
        let [elevated, high, critical] = thresholds;
        if value >= critical {
            Level::Critical
        } else if value >= high {
            Level::High
        } else if value >= elevated {
            Level::Elevated
        } else {
            Level::Normal
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Normal => "normal",
            Level::Elevated => "elevated",
            Level::High => "high",
            Level::Critical => "critical",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    /// Independent uniform samples over a range.
    Noise { min: f32, max: f32 },

    /// Bounded random walk.
    Drift { min: f32, max: f32, step: f32 },

    /// Slow triangle wave with jitter on top.
    Wave {
        min: f32,
        max: f32,
        period: u32,
        jitter: f32,
    },
}

/// A source of readings with its own severity thresholds.
#[derive(Debug, Clone)]
pub struct Probe {
    shape: Shape,
    thresholds: [f32; 3],
    last: f32,
    samples: u32,
}

impl Probe {
    /// CPU usage in percent, uncorrelated from sample to sample.
    pub fn cpu() -> Self {
        Self::new(Shape::Noise { min: 0.0, max: 100.0 }, [50.0, 75.0, 90.0])
    }

    /// Memory usage in percent, drifting slowly.
    pub fn memory() -> Self {
        Self::new(
            Shape::Drift {
                min: 20.0,
                max: 95.0,
                step: 8.0,
            },
            [60.0, 80.0, 90.0],
        )
    }

    /// Temperature in °C, cycling between idle and load.
    pub fn temperature() -> Self {
        Self::new(
            Shape::Wave {
                min: 40.0,
                max: 92.0,
                period: 40,
                jitter: 3.0,
            },
            [60.0, 75.0, 85.0],
        )
    }

    fn new(shape: Shape, thresholds: [f32; 3]) -> Self {
        let last = match shape {
            Shape::Noise { min, .. } | Shape::Drift { min, .. } | Shape::Wave { min, .. } => min,
        };
        Self {
            shape,
            thresholds,
            last,
            samples: 0,
        }
    }

    /// Take one reading and classify it.
    pub fn sample(&mut self) -> Level {
        let mut rng = rand::thread_rng();
        let value = match self.shape {
            Shape::Noise { min, max } => rng.gen_range(min..=max),
            Shape::Drift { min, max, step } => {
                (self.last + rng.gen_range(-step..=step)).clamp(min, max)
            }
            Shape::Wave {
                min,
                max,
                period,
                jitter,
            } => {
                let phase = (self.samples % period) as f32 / period as f32;
                let triangle = 1.0 - (2.0 * phase - 1.0).abs();
                let value = min + (max - min) * triangle + rng.gen_range(-jitter..=jitter);
                value.clamp(min, max)
            }
        };

        self.last = value;
        self.samples = self.samples.wrapping_add(1);
        Level::classify(value, self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_inclusive_thresholds() {
        let thresholds = [60.0, 75.0, 85.0];
        assert_eq!(Level::classify(59.9, thresholds), Level::Normal);
        assert_eq!(Level::classify(60.0, thresholds), Level::Elevated);
        assert_eq!(Level::classify(75.0, thresholds), Level::High);
        assert_eq!(Level::classify(99.0, thresholds), Level::Critical);
    }

    #[test]
    fn drift_stays_in_bounds() {
        let mut probe = Probe::memory();
        for _ in 0..1000 {
            probe.sample();
            assert!((20.0..=95.0).contains(&probe.last));
        }
    }

    #[test]
    fn wave_reaches_both_ends() {
        let mut probe = Probe::temperature();
        let levels: Vec<Level> = (0..40).map(|_| probe.sample()).collect();
        assert!(levels.contains(&Level::Normal));
        assert!(levels.contains(&Level::Critical));
    }
}
