//! Attribute-subscription recording.
//!
//! Sinks only ever see `(key, attribute range)` registrations and per-step
//! samples of raw cell values; any formatting or file output lives in the
//! sink implementation, never in the engine.

use vf_core::attribute::{AttrRange, AttributeStore};

/// A data sink subscribed to attributes by name.
pub trait DataSink: Send {
    fn register_attribute(&mut self, key: &str, range: AttrRange);

    /// Called once per step, after the end-of-step commit.
    fn sample(&mut self, time: f64, step: usize, store: &AttributeStore);
}

/// In-memory recorder, mainly for tests and small runs.
#[derive(Default)]
pub struct MemoryRecorder {
    channels: Vec<(String, AttrRange)>,
    times: Vec<f64>,
    /// data[channel][sample][cell]
    data: Vec<Vec<Vec<f64>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn sample_count(&self) -> usize {
        self.times.len()
    }

    fn channel_index(&self, key: &str) -> Option<usize> {
        self.channels.iter().position(|(k, _)| k == key)
    }

    /// Scalar channel as one value per sample (first cell of the range).
    pub fn scalar_series(&self, key: &str) -> Option<Vec<f64>> {
        let i = self.channel_index(key)?;
        Some(self.data[i].iter().map(|row| row[0]).collect())
    }

    /// Last recorded value of a scalar channel.
    pub fn last(&self, key: &str) -> Option<f64> {
        let i = self.channel_index(key)?;
        self.data[i].last().map(|row| row[0])
    }

    /// Value of a scalar channel at the sample closest to `time`.
    pub fn at_time(&self, key: &str, time: f64) -> Option<f64> {
        let i = self.channel_index(key)?;
        let (best, _) = self
            .times
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - time).abs().total_cmp(&(*b - time).abs()))?;
        self.data[i].get(best).map(|row| row[0])
    }
}

impl DataSink for MemoryRecorder {
    fn register_attribute(&mut self, key: &str, range: AttrRange) {
        self.channels.push((key.to_string(), range));
        self.data.push(Vec::new());
    }

    fn sample(&mut self, time: f64, _step: usize, store: &AttributeStore) {
        self.times.push(time);
        for (i, (_, range)) in self.channels.iter().enumerate() {
            let mut row = vec![0.0; range.len];
            store.read_into(*range, &mut row);
            self.data[i].push(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::attribute::AccessFlags;

    #[test]
    fn records_registered_channels() {
        let mut store = AttributeStore::new();
        let a = store.register("r1", "i_intf", 1, AccessFlags::READ).unwrap();

        let mut recorder = MemoryRecorder::new();
        recorder.register_attribute("r1.i", a);

        store.set_scalar(a, 1.5);
        recorder.sample(0.0, 0, &store);
        store.set_scalar(a, 2.5);
        recorder.sample(1e-4, 1, &store);

        assert_eq!(recorder.sample_count(), 2);
        assert_eq!(recorder.scalar_series("r1.i").unwrap(), vec![1.5, 2.5]);
        assert_eq!(recorder.last("r1.i"), Some(2.5));
        assert_eq!(recorder.at_time("r1.i", 0.0), Some(1.5));
        assert!(recorder.scalar_series("unknown").is_none());
    }
}
