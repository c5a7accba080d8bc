//! Synthetic Sources
//!
//! Stand-ins for bodies with no public quake feed. One reading per interval
//! step, walking backward from now, with a uniformly random magnitude.

use super::*;
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::ops::Range;
use std::sync::Mutex;

/// Uniform random magnitude generator for one body
pub struct SyntheticSource {
    name: String,
    body: Body,
    magnitudes: Range<f64>,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    /// Create a generator over `magnitudes`
    pub fn new(name: impl Into<String>, body: Body, magnitudes: Range<f64>) -> Self {
        Self {
            name: name.into(),
            body,
            magnitudes,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Mars stand-in, magnitudes in [1, 4)
    pub fn mars() -> Self {
        Self::new("mars-synthetic", Body::Mars, 1.0..4.0)
    }

    /// Moon stand-in, magnitudes in [0.5, 2.5)
    pub fn moon() -> Self {
        Self::new("moon-synthetic", Body::Moon, 0.5..2.5)
    }

    /// Reseed for reproducible output
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn magnitude_range(&self) -> &Range<f64> {
        &self.magnitudes
    }

    /// Generate readings for `window` ending at `now`
    pub fn generate(&self, window: Window, now: DateTime<Utc>) -> Vec<Reading> {
        let step = Duration::minutes(i64::from(window.interval_minutes));
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        (0..window.steps())
            .map(|i| {
                let magnitude = rng.gen_range(self.magnitudes.clone());
                Reading::new(now - step * i as i32, magnitude)
            })
            .collect()
    }
}

#[async_trait]
impl ReadingSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn body(&self) -> Body {
        self.body
    }

    async fn fetch(&self, window: Window) -> Result<Vec<Reading>, SourceError> {
        Ok(self.generate(window, Utc::now()))
    }
}
