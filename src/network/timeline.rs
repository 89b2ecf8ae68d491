//! Structural stability intervals laid out on a continuous time axis.

use crate::data::DataInterface;
use crate::types::DataError;

/// Cumulative interval bounds built from `tl[l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    durations: Vec<f64>,
    ends: Vec<f64>,
}

impl Timeline {
    pub fn new(durations: Vec<f64>) -> Result<Self, DataError> {
        let mut ends = Vec::with_capacity(durations.len());
        let mut total = 0.0;
        for &duration in &durations {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(DataError::InvalidValue {
                    variable: "tl".into(),
                    value: duration,
                    reason: "interval duration must be positive".into(),
                });
            }
            total += duration;
            ends.push(total);
        }
        Ok(Self { durations, ends })
    }

    /// Read `tl[0..intervals]` from the data.
    pub fn from_data(data: &dyn DataInterface, intervals: usize) -> Result<Self, DataError> {
        let durations = (0..intervals)
            .map(|l| data.get("tl", &[("l", l)]))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(durations)
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn duration_of(&self, l: usize) -> Option<f64> {
        self.durations.get(l).copied()
    }

    /// Right (exclusive) bound of interval `l`.
    pub fn interval_end(&self, l: usize) -> Option<f64> {
        self.ends.get(l).copied()
    }

    pub fn interval_start(&self, l: usize) -> Option<f64> {
        if l >= self.ends.len() {
            return None;
        }
        Some(if l == 0 { 0.0 } else { self.ends[l - 1] })
    }

    /// First interval whose end lies past `t`. `None` beyond the timeline.
    pub fn interval_at(&self, t: f64) -> Option<usize> {
        self.ends.iter().position(|&end| t < end)
    }

    pub fn duration(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_interval_bounds_are_cumulative() {
        let timeline = Timeline::new(vec![4.0, 2.0, 1.0]).unwrap();
        assert_eq!(timeline.interval_end(0), Some(4.0));
        assert_eq!(timeline.interval_end(2), Some(7.0));
        assert_eq!(timeline.interval_end(3), None);
        assert_eq!(timeline.interval_start(0), Some(0.0));
        assert_eq!(timeline.interval_start(2), Some(6.0));
        assert_eq!(timeline.interval_start(3), None);
        assert_abs_diff_eq!(timeline.duration(), 7.0);
    }

    #[test]
    fn test_interval_at() {
        let timeline = Timeline::new(vec![4.0, 2.0, 1.0]).unwrap();
        assert_eq!(timeline.interval_at(0.0), Some(0));
        assert_eq!(timeline.interval_at(3.99), Some(0));
        assert_eq!(timeline.interval_at(4.0), Some(1));
        assert_eq!(timeline.interval_at(6.5), Some(2));
        assert_eq!(timeline.interval_at(7.0), None);
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        assert!(Timeline::new(vec![1.0, 0.0]).is_err());
        assert!(Timeline::new(vec![-1.0]).is_err());
        assert!(Timeline::new(vec![f64::NAN]).is_err());
    }
}
