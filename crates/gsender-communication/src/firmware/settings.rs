//! EEPROM settings
//!
//! GRBL 1.1 exposes a fixed table of `$n` settings, so those are modelled as
//! a closed enum. grblHAL extends the table with plugin-defined ids and
//! string values, so its settings stay keyed by number.

use gsender_core::{ControllerType, FirmwareError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! grbl_settings {
    ($( $variant:ident = $id:literal, $desc:literal, $boolean:literal; )*) => {
        /// GRBL 1.1 setting ids
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum GrblSetting {
            $( $variant, )*
        }

        impl GrblSetting {
            /// Every GRBL 1.1 setting in id order
            pub const ALL: &'static [GrblSetting] = &[$( GrblSetting::$variant, )*];

            /// Numeric id (`$n`)
            pub fn id(self) -> u16 {
                match self {
                    $( GrblSetting::$variant => $id, )*
                }
            }

            /// Look up a setting by numeric id
            pub fn from_id(id: u16) -> Option<Self> {
                match id {
                    $( $id => Some(GrblSetting::$variant), )*
                    _ => None,
                }
            }

            /// Short description as printed by `$$` help
            pub fn description(self) -> &'static str {
                match self {
                    $( GrblSetting::$variant => $desc, )*
                }
            }

            /// Whether the setting only accepts 0 or 1
            pub fn is_boolean(self) -> bool {
                match self {
                    $( GrblSetting::$variant => $boolean, )*
                }
            }
        }
    };
}

grbl_settings! {
    StepPulseTime = 0, "Step pulse time, microseconds", false;
    StepIdleDelay = 1, "Step idle delay, milliseconds", false;
    StepPortInvert = 2, "Step pulse invert, mask", false;
    DirectionPortInvert = 3, "Step direction invert, mask", false;
    StepEnableInvert = 4, "Invert step enable pin", true;
    LimitPinsInvert = 5, "Invert limit pins", true;
    ProbePinInvert = 6, "Invert probe pin", true;
    StatusReportMask = 10, "Status report options, mask", false;
    JunctionDeviation = 11, "Junction deviation, millimeters", false;
    ArcTolerance = 12, "Arc tolerance, millimeters", false;
    ReportInches = 13, "Report in inches", true;
    SoftLimits = 20, "Soft limits enable", true;
    HardLimits = 21, "Hard limits enable", true;
    HomingCycle = 22, "Homing cycle enable", true;
    HomingDirectionInvert = 23, "Homing direction invert, mask", false;
    HomingFeed = 24, "Homing locate feed rate, mm/min", false;
    HomingSeek = 25, "Homing search seek rate, mm/min", false;
    HomingDebounce = 26, "Homing switch debounce delay, milliseconds", false;
    HomingPullOff = 27, "Homing switch pull-off distance, millimeters", false;
    MaxSpindleSpeed = 30, "Maximum spindle speed, RPM", false;
    MinSpindleSpeed = 31, "Minimum spindle speed, RPM", false;
    LaserMode = 32, "Laser-mode enable", true;
    XStepsPerMm = 100, "X-axis travel resolution, step/mm", false;
    YStepsPerMm = 101, "Y-axis travel resolution, step/mm", false;
    ZStepsPerMm = 102, "Z-axis travel resolution, step/mm", false;
    XMaxRate = 110, "X-axis maximum rate, mm/min", false;
    YMaxRate = 111, "Y-axis maximum rate, mm/min", false;
    ZMaxRate = 112, "Z-axis maximum rate, mm/min", false;
    XAcceleration = 120, "X-axis acceleration, mm/sec^2", false;
    YAcceleration = 121, "Y-axis acceleration, mm/sec^2", false;
    ZAcceleration = 122, "Z-axis acceleration, mm/sec^2", false;
    XMaxTravel = 130, "X-axis maximum travel, millimeters", false;
    YMaxTravel = 131, "Y-axis maximum travel, millimeters", false;
    ZMaxTravel = 132, "Z-axis maximum travel, millimeters", false;
}

impl GrblSetting {
    /// Check `value` against the setting's type
    pub fn validate(self, value: &str) -> Result<()> {
        let invalid = |reason: &str| FirmwareError::InvalidSettingValue {
            setting: format!("${}", self.id()),
            reason: reason.to_string(),
        };
        let number: f64 = value.trim().parse().map_err(|_| invalid("not a number"))?;
        if number < 0.0 {
            return Err(invalid("must not be negative").into());
        }
        if self.is_boolean() && number != 0.0 && number != 1.0 {
            return Err(invalid("must be 0 or 1").into());
        }
        Ok(())
    }
}

impl std::fmt::Display for GrblSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.id())
    }
}

/// Parse a `$n` (or bare `n`) setting key
pub fn parse_setting_key(key: &str) -> Option<u16> {
    let key = key.trim();
    key.strip_prefix('$').unwrap_or(key).parse().ok()
}

/// Parse a `$n=value` line as echoed by `$$`
pub fn parse_setting_line(line: &str) -> Option<(u16, String)> {
    let (key, value) = line.trim().split_once('=')?;
    if !key.starts_with('$') {
        return None;
    }
    let id = parse_setting_key(key)?;
    // grblHAL may append a description in parentheses
    let value = value.split('(').next().unwrap_or(value).trim();
    Some((id, value.to_string()))
}

/// EEPROM settings for one firmware, in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "firmware", content = "settings")]
pub enum EepromSettings {
    Grbl(Vec<(GrblSetting, String)>),
    GrblHal(Vec<(u16, String)>),
}

impl EepromSettings {
    /// Build from `$n -> value` pairs, keeping their order
    ///
    /// GRBL ids outside the 1.1 table and malformed GRBL values are
    /// rejected. grblHAL accepts any numeric id and any value.
    pub fn from_pairs<I, K, V>(firmware: ControllerType, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let id = parse_setting_key(key).ok_or_else(|| FirmwareError::InvalidProfile {
                reason: format!("malformed setting key '{}'", key),
            })?;
            entries.push((id, key.to_string(), value.into()));
        }

        match firmware {
            ControllerType::Grbl => {
                let mut settings = Vec::with_capacity(entries.len());
                for (id, key, value) in entries {
                    let setting =
                        GrblSetting::from_id(id).ok_or_else(|| FirmwareError::SettingNotAvailable {
                            setting: key,
                            firmware: firmware.to_string(),
                        })?;
                    setting.validate(&value)?;
                    settings.push((setting, value));
                }
                Ok(Self::Grbl(settings))
            }
            ControllerType::GrblHal => Ok(Self::GrblHal(
                entries.into_iter().map(|(id, _, value)| (id, value)).collect(),
            )),
        }
    }

    /// Target firmware
    pub fn firmware(&self) -> ControllerType {
        match self {
            Self::Grbl(_) => ControllerType::Grbl,
            Self::GrblHal(_) => ControllerType::GrblHal,
        }
    }

    /// `(id, value)` pairs in source order
    pub fn entries(&self) -> Vec<(u16, &str)> {
        match self {
            Self::Grbl(settings) => settings.iter().map(|(s, v)| (s.id(), v.as_str())).collect(),
            Self::GrblHal(settings) => settings.iter().map(|(id, v)| (*id, v.as_str())).collect(),
        }
    }

    /// Value for `id`, last occurrence wins
    pub fn get(&self, id: u16) -> Option<&str> {
        self.entries()
            .into_iter()
            .rev()
            .find(|(i, _)| *i == id)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Grbl(settings) => settings.len(),
            Self::GrblHal(settings) => settings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Settings reported by the controller in response to `$$`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedSettings {
    values: BTreeMap<u16, String>,
}

impl ReportedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one echoed setting
    pub fn record(&mut self, id: u16, value: impl Into<String>) {
        self.values.insert(id, value.into());
    }

    pub fn get(&self, id: u16) -> Option<&str> {
        self.values.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ids whose reported value differs from `wanted`
    ///
    /// Values are compared numerically when both parse, so `10` matches
    /// `10.000`. Ids never reported count as different.
    pub fn mismatches(&self, wanted: &EepromSettings) -> Vec<u16> {
        wanted
            .entries()
            .into_iter()
            .filter(|(id, value)| match self.get(*id) {
                Some(reported) => !values_match(reported, value),
                None => true,
            })
            .map(|(id, _)| id)
            .collect()
    }
}

fn values_match(a: &str, b: &str) -> bool {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => (x - y).abs() < 1e-9,
        _ => a.trim() == b.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_ids_round_trip() {
        for setting in GrblSetting::ALL {
            assert_eq!(GrblSetting::from_id(setting.id()), Some(*setting));
        }
        assert_eq!(GrblSetting::from_id(7), None);
        assert_eq!(GrblSetting::HomingCycle.to_string(), "$22");
    }

    #[test]
    fn test_validate() {
        assert!(GrblSetting::SoftLimits.validate("1").is_ok());
        assert!(GrblSetting::SoftLimits.validate("2").is_err());
        assert!(GrblSetting::XStepsPerMm.validate("250.000").is_ok());
        assert!(GrblSetting::XStepsPerMm.validate("abc").is_err());
        assert!(GrblSetting::XMaxTravel.validate("-5").is_err());
    }

    #[test]
    fn test_parse_setting_line() {
        assert_eq!(parse_setting_line("$22=1"), Some((22, "1".to_string())));
        assert_eq!(
            parse_setting_line("$110=500.000 (x max rate, mm/min)"),
            Some((110, "500.000".to_string()))
        );
        assert_eq!(parse_setting_line("[GC:G0 G54]"), None);
        assert_eq!(parse_setting_line("ok"), None);
    }

    #[test]
    fn test_from_pairs_preserves_order() {
        let settings = EepromSettings::from_pairs(
            ControllerType::Grbl,
            vec![("$22", "1"), ("$20", "1"), ("$100", "80")],
        )
        .unwrap();
        assert_eq!(settings.entries(), vec![(22, "1"), (20, "1"), (100, "80")]);
        assert_eq!(settings.firmware(), ControllerType::Grbl);
    }

    #[test]
    fn test_grbl_rejects_unknown_id() {
        let err = EepromSettings::from_pairs(ControllerType::Grbl, vec![("$300", "name")])
            .unwrap_err();
        assert!(err.is_firmware_error());
    }

    #[test]
    fn test_grblhal_accepts_extended_ids() {
        let settings =
            EepromSettings::from_pairs(ControllerType::GrblHal, vec![("$300", "gsender")]).unwrap();
        assert_eq!(settings.get(300), Some("gsender"));
    }

    #[test]
    fn test_reported_mismatches() {
        let wanted = EepromSettings::from_pairs(
            ControllerType::Grbl,
            vec![("$100", "80"), ("$22", "1"), ("$20", "1")],
        )
        .unwrap();
        let mut reported = ReportedSettings::new();
        reported.record(100, "80.000");
        reported.record(22, "0");
        assert_eq!(reported.mismatches(&wanted), vec![22, 20]);
    }
}
