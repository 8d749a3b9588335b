use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{ActivityLevel, Gender};

/// Derived body metrics stored alongside the profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub bmi: Option<f64>,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if weight_kg <= 0.0 || height_cm <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some(round2(weight_kg / (height_m * height_m)))
}

pub fn bmi_category(bmi: f64) -> &'static str {
    match bmi {
        b if b < 18.5 => "underweight",
        b if b < 25.0 => "normal",
        b if b < 30.0 => "overweight",
        _ => "obese",
    }
}

/// Mifflin-St Jeor; profiles without a gender are treated as female
pub fn bmr(weight_kg: f64, height_cm: f64, age_years: u32, gender: Option<Gender>) -> Option<f64> {
    if weight_kg <= 0.0 || height_cm <= 0.0 {
        return None;
    }
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years as f64;
    let adjustment = match gender {
        Some(Gender::Male) => 5.0,
        _ => -161.0,
    };
    Some(round2(base + adjustment))
}

pub fn tdee(bmr: f64, activity_level: ActivityLevel) -> f64 {
    round2(bmr * activity_level.multiplier())
}

pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

pub struct BodyProfile {
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub activity_level: ActivityLevel,
}

impl BodyProfile {
    /// Each metric is `None` when its inputs are missing
    pub fn metrics(&self, today: NaiveDate) -> HealthMetrics {
        let (Some(weight), Some(height)) = (self.weight_kg, self.height_cm) else {
            return HealthMetrics::default();
        };

        let bmi = bmi(weight, height);
        let bmr = self
            .birth_date
            .and_then(|birth| bmr(weight, height, age_on(birth, today), self.gender));
        let tdee = bmr.map(|value| tdee(value, self.activity_level));

        HealthMetrics { bmi, bmr, tdee }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bmi() {
        assert_eq!(bmi(60.0, 165.0), Some(22.04));
        assert_eq!(bmi(0.0, 165.0), None);
        assert_eq!(bmi_category(22.04), "normal");
        assert_eq!(bmi_category(17.0), "underweight");
        assert_eq!(bmi_category(31.2), "obese");
    }

    #[test]
    fn test_bmr_by_gender() {
        // 10*60 + 6.25*165 - 5*30 = 1481.25
        assert_eq!(bmr(60.0, 165.0, 30, None), Some(1320.25));
        assert_eq!(bmr(60.0, 165.0, 30, Some(Gender::Female)), Some(1320.25));
        assert_eq!(bmr(60.0, 165.0, 30, Some(Gender::Male)), Some(1486.25));
    }

    #[test]
    fn test_tdee_multipliers() {
        assert_eq!(tdee(1000.0, ActivityLevel::Sedentary), 1200.0);
        assert_eq!(tdee(1000.0, ActivityLevel::Light), 1375.0);
        assert_eq!(tdee(1000.0, ActivityLevel::Moderate), 1550.0);
        assert_eq!(tdee(1000.0, ActivityLevel::Active), 1725.0);
        assert_eq!(tdee(1000.0, ActivityLevel::VeryActive), 1900.0);
    }

    #[test]
    fn test_age() {
        assert_eq!(age_on(date(1994, 6, 15), date(2024, 6, 14)), 29);
        assert_eq!(age_on(date(1994, 6, 15), date(2024, 6, 15)), 30);
    }

    #[test]
    fn test_profile_metrics_with_missing_inputs() {
        let today = date(2024, 6, 15);
        let mut profile = BodyProfile {
            weight_kg: Some(60.0),
            height_cm: Some(165.0),
            birth_date: None,
            gender: None,
            activity_level: ActivityLevel::Active,
        };

        let metrics = profile.metrics(today);
        assert_eq!(metrics.bmi, Some(22.04));
        assert_eq!(metrics.bmr, None);
        assert_eq!(metrics.tdee, None);

        profile.birth_date = Some(date(1994, 6, 15));
        let metrics = profile.metrics(today);
        assert_eq!(metrics.bmr, Some(1320.25));
        assert_eq!(metrics.tdee, Some(2277.43));

        profile.height_cm = None;
        assert_eq!(profile.metrics(today), HealthMetrics::default());
    }
}
