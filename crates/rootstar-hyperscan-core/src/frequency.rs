//! Frequencies of interest
//!
//! The order of bins fixes the frequency block index used by
//! [`crate::layout::global_index`], so it is validated once and never
//! changed afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{HyperscanError, HyperscanResult};

/// Strictly increasing list of frequencies (Hz).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FrequencyBins(Vec<f64>);

impl FrequencyBins {
    /// Validate and wrap frequency values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is non-finite or negative,
    /// or the values are not strictly increasing.
    pub fn new(frequencies: Vec<f64>) -> HyperscanResult<Self> {
        if let Some(bad) = frequencies.iter().find(|f| !f.is_finite() || **f < 0.0) {
            return Err(HyperscanError::configuration(
                "frequency bins",
                format!("frequency {bad} is not a finite non-negative value"),
            ));
        }
        if let Some(w) = frequencies.windows(2).find(|w| w[0] >= w[1]) {
            return Err(HyperscanError::configuration(
                "frequency bins",
                format!(
                    "frequencies must be strictly increasing, found {} then {}",
                    w[0], w[1]
                ),
            ));
        }
        Ok(Self(frequencies))
    }

    /// Integer-spaced bins `[low, high]` with a step of 1 Hz.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `low > high`.
    pub fn range_hz(low: u32, high: u32) -> HyperscanResult<Self> {
        if low > high {
            return Err(HyperscanError::configuration(
                "frequency bins",
                format!("empty range {low}..={high} Hz"),
            ));
        }
        Self::new((low..=high).map(f64::from).collect())
    }

    /// Number of bins F
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no bins
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bin values in block order
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Block index of an exact frequency value
    #[must_use]
    pub fn index_of(&self, frequency: f64) -> Option<usize> {
        self.0.iter().position(|&f| f == frequency)
    }
}

impl TryFrom<Vec<f64>> for FrequencyBins {
    type Error = HyperscanError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FrequencyBins> for Vec<f64> {
    fn from(bins: FrequencyBins) -> Self {
        bins.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bins() {
        let bins = FrequencyBins::new(vec![11.0, 12.0, 13.0]).unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.index_of(12.0), Some(1));
        assert_eq!(bins.index_of(14.0), None);
    }

    #[test]
    fn test_rejects_unordered() {
        let err = FrequencyBins::new(vec![12.0, 11.0]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_rejects_duplicates() {
        assert!(FrequencyBins::new(vec![10.0, 10.0]).is_err());
    }

    #[test]
    fn test_rejects_nan() {
        assert!(FrequencyBins::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_empty_is_allowed() {
        assert!(FrequencyBins::new(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_range_hz() {
        let bins = FrequencyBins::range_hz(8, 12).unwrap();
        assert_eq!(bins.as_slice(), [8.0, 9.0, 10.0, 11.0, 12.0]);
        assert!(FrequencyBins::range_hz(12, 8).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let bins: FrequencyBins = serde_json::from_str("[11.0, 12.0]").unwrap();
        assert_eq!(bins.len(), 2);
        assert!(serde_json::from_str::<FrequencyBins>("[12.0, 11.0]").is_err());
    }
}
