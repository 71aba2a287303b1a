//! Renewable availability profiles.

use merit_core::{DispatchError, DispatchResult, GeneratorCategory};
use serde::{Deserialize, Serialize};

/// Samples per hour in a 5-minute profile.
pub const FIVE_MINUTE_SAMPLES_PER_HOUR: usize = 12;

/// Availability fractions per step for each renewable category.
///
/// A missing series leaves that category on its generators' own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityProfile {
    pub solar: Option<Vec<f64>>,
    pub wind: Option<Vec<f64>>,
}

impl AvailabilityProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solar(mut self, solar: Vec<f64>) -> Self {
        self.solar = Some(solar);
        self
    }

    pub fn with_wind(mut self, wind: Vec<f64>) -> Self {
        self.wind = Some(wind);
        self
    }

    pub fn series(&self, category: GeneratorCategory) -> Option<&[f64]> {
        match category {
            GeneratorCategory::SolarPV => self.solar.as_deref(),
            GeneratorCategory::WindFarm => self.wind.as_deref(),
            GeneratorCategory::Dispatchable => None,
        }
    }

    /// Fraction for `category` at step `index`, if the profile has one.
    pub fn fraction(&self, category: GeneratorCategory, index: usize) -> Option<f64> {
        self.series(category).and_then(|s| s.get(index).copied())
    }

    /// Check series lengths against the load profile and value ranges.
    pub fn validate(&self, steps: usize) -> DispatchResult<()> {
        for (label, series) in [("solar", &self.solar), ("wind", &self.wind)] {
            let Some(series) = series else { continue };
            if series.len() != steps {
                return Err(DispatchError::Validation(format!(
                    "{} availability has {} values but the load profile has {}",
                    label,
                    series.len(),
                    steps
                )));
            }
            if let Some((i, v)) = series
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(*v))
            {
                return Err(DispatchError::Validation(format!(
                    "{} availability at step {} must be within [0, 1], got {}",
                    label, i, v
                )));
            }
        }
        Ok(())
    }

    /// Downsample every series with [`downsample_mean`].
    pub fn downsampled(&self, bucket: usize) -> DispatchResult<Self> {
        Ok(Self {
            solar: self
                .solar
                .as_deref()
                .map(|s| downsample_mean(s, bucket))
                .transpose()?,
            wind: self
                .wind
                .as_deref()
                .map(|s| downsample_mean(s, bucket))
                .transpose()?,
        })
    }
}

/// Mean of consecutive `bucket`-sized chunks. A trailing partial chunk is
/// averaged over its own length.
pub fn downsample_mean(values: &[f64], bucket: usize) -> DispatchResult<Vec<f64>> {
    if bucket == 0 {
        return Err(DispatchError::Config("downsample bucket must be at least 1".into()));
    }
    Ok(values
        .chunks(bucket)
        .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_means_from_five_minute_samples() {
        let mut samples = vec![0.0; 12];
        samples.extend(vec![0.6; 12]);
        samples.extend([0.3, 0.9]);
        let hourly = downsample_mean(&samples, FIVE_MINUTE_SAMPLES_PER_HOUR).unwrap();
        assert_eq!(hourly.len(), 3);
        assert_eq!(hourly[0], 0.0);
        assert!((hourly[1] - 0.6).abs() < 1e-12);
        assert!((hourly[2] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn zero_bucket_is_rejected() {
        assert!(downsample_mean(&[1.0], 0).is_err());
        assert!(downsample_mean(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn validates_length_and_range() {
        let profile = AvailabilityProfile::new().with_solar(vec![0.1, 0.2]);
        assert!(profile.validate(2).is_ok());
        assert!(profile.validate(3).is_err());
        let bad = AvailabilityProfile::new().with_wind(vec![0.1, 1.2]);
        assert!(bad.validate(2).is_err());
    }

    #[test]
    fn lookup_by_category() {
        let profile = AvailabilityProfile::new()
            .with_solar(vec![0.0, 0.5])
            .with_wind(vec![0.9, 0.8]);
        assert_eq!(profile.fraction(GeneratorCategory::SolarPV, 1), Some(0.5));
        assert_eq!(profile.fraction(GeneratorCategory::WindFarm, 0), Some(0.9));
        assert_eq!(profile.fraction(GeneratorCategory::Dispatchable, 0), None);
        assert_eq!(profile.fraction(GeneratorCategory::SolarPV, 5), None);

        let hourly = profile.downsampled(2).unwrap();
        assert_eq!(hourly.solar, Some(vec![0.25]));
    }
}
