//! Allocation settings and their validator.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, RangeInclusive};

use crate::error::{AllocationError, SettingsViolation, SettingsViolations};

const WEIGHT_RANGE: RangeInclusive<u32> = 0..=100;
const DAY_LIMIT_RANGE: RangeInclusive<u32> = 1..=5;
const WINDOW_RANGE: RangeInclusive<u32> = 1..=30;
const HOUR_RANGE: RangeInclusive<u32> = 0..=23;

/// Knobs edited on the allocation settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllocationSettings {
    pub total_spaces: u32,
    pub reserved_spaces: u32,
    pub fairness_weight: u32,
    pub attendance_weight: u32,
    pub min_attendance_days: u32,
    pub max_consecutive_days: u32,
    pub enable_weekend_parking: bool,
    pub auto_assign: bool,
    /// Days ahead of today covered by an allocation run.
    pub assignment_window: u32,
    /// Local hour at which the daily run happens.
    pub notification_time: u32,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            total_spaces: 30,
            reserved_spaces: 5,
            fairness_weight: 70,
            attendance_weight: 30,
            min_attendance_days: 1,
            max_consecutive_days: 3,
            enable_weekend_parking: false,
            auto_assign: true,
            assignment_window: 7,
            notification_time: 9,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub total_spaces: Option<u32>,
    pub reserved_spaces: Option<u32>,
    pub fairness_weight: Option<u32>,
    pub attendance_weight: Option<u32>,
    pub min_attendance_days: Option<u32>,
    pub max_consecutive_days: Option<u32>,
    pub enable_weekend_parking: Option<bool>,
    pub auto_assign: Option<bool>,
    pub assignment_window: Option<u32>,
    pub notification_time: Option<u32>,
}

impl AllocationSettings {
    /// Returns every violated bound, in field order. Empty when the settings are valid.
    pub fn violations(&self) -> Vec<SettingsViolation> {
        let mut violations = Vec::new();
        if self.reserved_spaces > self.total_spaces {
            violations.push(SettingsViolation::ReservedExceedsTotal {
                reserved: self.reserved_spaces,
                total: self.total_spaces,
            });
        }

        let bounded = [
            ("fairnessWeight", self.fairness_weight, WEIGHT_RANGE),
            ("attendanceWeight", self.attendance_weight, WEIGHT_RANGE),
            ("minAttendanceDays", self.min_attendance_days, DAY_LIMIT_RANGE),
            ("maxConsecutiveDays", self.max_consecutive_days, DAY_LIMIT_RANGE),
            ("assignmentWindow", self.assignment_window, WINDOW_RANGE),
            ("notificationTime", self.notification_time, HOUR_RANGE),
        ];
        for (field, value, range) in bounded {
            if !range.contains(&value) {
                violations.push(SettingsViolation::OutOfRange {
                    field,
                    value,
                    min: *range.start(),
                    max: *range.end(),
                });
            }
        }
        violations
    }

    /// Validates the whole candidate. Values are never clamped.
    pub fn validate(self) -> Result<ValidatedSettings, AllocationError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(ValidatedSettings(self))
        } else {
            Err(AllocationError::InvalidSettings(SettingsViolations(violations)))
        }
    }

    #[must_use]
    pub fn patched(&self, patch: &SettingsPatch) -> Self {
        Self {
            total_spaces: patch.total_spaces.unwrap_or(self.total_spaces),
            reserved_spaces: patch.reserved_spaces.unwrap_or(self.reserved_spaces),
            fairness_weight: patch.fairness_weight.unwrap_or(self.fairness_weight),
            attendance_weight: patch.attendance_weight.unwrap_or(self.attendance_weight),
            min_attendance_days: patch.min_attendance_days.unwrap_or(self.min_attendance_days),
            max_consecutive_days: patch.max_consecutive_days.unwrap_or(self.max_consecutive_days),
            enable_weekend_parking: patch
                .enable_weekend_parking
                .unwrap_or(self.enable_weekend_parking),
            auto_assign: patch.auto_assign.unwrap_or(self.auto_assign),
            assignment_window: patch.assignment_window.unwrap_or(self.assignment_window),
            notification_time: patch.notification_time.unwrap_or(self.notification_time),
        }
    }
}

/// Settings that passed validation. The engine only accepts this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSettings(AllocationSettings);

impl ValidatedSettings {
    pub fn fairness_factor(&self) -> f64 {
        normalize(self.0.fairness_weight)
    }

    pub fn attendance_factor(&self) -> f64 {
        normalize(self.0.attendance_weight)
    }

    /// Spaces open to scored candidates: `totalSpaces - reservedSpaces`.
    pub fn general_capacity(&self) -> u32 {
        self.0.total_spaces - self.0.reserved_spaces
    }

    pub fn into_inner(self) -> AllocationSettings {
        self.0
    }
}

impl Deref for ValidatedSettings {
    type Target = AllocationSettings;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn normalize(weight: u32) -> f64 {
    f64::from(weight) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = AllocationSettings::default().validate().unwrap();
        assert_eq!(settings.general_capacity(), 25);
        assert!((settings.fairness_factor() - 0.7).abs() < 1e-9);
        assert!((settings.attendance_factor() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_every_violation_reported() {
        let settings = AllocationSettings {
            total_spaces: 2,
            reserved_spaces: 3,
            fairness_weight: 101,
            attendance_weight: 50,
            min_attendance_days: 0,
            max_consecutive_days: 6,
            enable_weekend_parking: false,
            auto_assign: true,
            assignment_window: 31,
            notification_time: 24,
        };

        let Err(AllocationError::InvalidSettings(violations)) = settings.validate() else {
            panic!("expected invalid settings");
        };
        assert_eq!(violations.len(), 6);
        assert_eq!(
            violations.0[0],
            SettingsViolation::ReservedExceedsTotal { reserved: 3, total: 2 }
        );
        let fields: Vec<&str> = violations
            .iter()
            .filter_map(|v| match v {
                SettingsViolation::OutOfRange { field, .. } => Some(*field),
                SettingsViolation::ReservedExceedsTotal { .. } => None,
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                "fairnessWeight",
                "minAttendanceDays",
                "maxConsecutiveDays",
                "assignmentWindow",
                "notificationTime"
            ]
        );
    }

    #[test]
    fn test_weights_need_not_sum_to_hundred() {
        let settings = AllocationSettings {
            fairness_weight: 100,
            attendance_weight: 100,
            ..AllocationSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let base = AllocationSettings::default();
        let patch = SettingsPatch {
            fairness_weight: Some(10),
            enable_weekend_parking: Some(true),
            ..SettingsPatch::default()
        };
        let patched = base.patched(&patch);
        assert_eq!(patched.fairness_weight, 10);
        assert!(patched.enable_weekend_parking);
        assert_eq!(patched.attendance_weight, base.attendance_weight);
        assert_eq!(patched.assignment_window, base.assignment_window);
    }

    #[test]
    fn test_camel_case_wire_names() {
        let json = r#"{"totalSpaces":10,"reservedSpaces":2,"enableWeekendParking":true}"#;
        let settings: AllocationSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.total_spaces, 10);
        assert_eq!(settings.reserved_spaces, 2);
        assert!(settings.enable_weekend_parking);
        assert_eq!(settings.fairness_weight, 70);
    }
}
