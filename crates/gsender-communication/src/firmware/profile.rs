//! Machine profiles
//!
//! A profile names a machine and carries the EEPROM settings that configure
//! the controller for it. Applying a profile writes every `$n=value` line
//! and finishes with `$$` so the controller echoes its settings back.
//!
//! Profile files are JSON:
//!
//! ```json
//! {
//!   "name": "LongMill",
//!   "type": "MK2 30x30",
//!   "firmware": "grbl",
//!   "eepromSettings": { "$0": "10", "$20": "1", "$22": "1" }
//! }
//! ```
//!
//! Setting order in the file is preserved.

use super::settings::{EepromSettings, GrblSetting};
use gsender_core::{ControllerType, FirmwareError, Result};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

const SOFT_LIMITS: u16 = 20;
const HARD_LIMITS: u16 = 21;
const HOMING_CYCLE: u16 = 22;

/// Named machine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MachineProfile {
    pub name: String,
    /// Machine variant, e.g. table size
    pub machine_type: String,
    pub settings: EepromSettings,
}

impl MachineProfile {
    /// Build a profile from ordered settings
    pub fn new(
        name: impl Into<String>,
        machine_type: impl Into<String>,
        settings: EepromSettings,
    ) -> Self {
        Self {
            name: name.into(),
            machine_type: machine_type.into(),
            settings,
        }
    }

    /// Firmware the settings target
    pub fn firmware(&self) -> ControllerType {
        self.settings.firmware()
    }

    /// Parse a profile from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawProfile = serde_json::from_str(text).map_err(|e| {
            FirmwareError::InvalidProfile {
                reason: e.to_string(),
            }
        })?;

        let firmware = match raw.firmware.as_deref() {
            Some(name) => name.parse::<ControllerType>()?,
            None => ControllerType::default(),
        };
        let settings = EepromSettings::from_pairs(firmware, raw.eeprom_settings.0)?;

        Ok(Self {
            name: raw.name,
            machine_type: raw.machine_type.unwrap_or_default(),
            settings,
        })
    }

    /// Load a profile from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let profile = Self::from_json(&text)?;
        tracing::info!(
            "Loaded profile '{}' ({} settings) from {}",
            profile.name,
            profile.settings.len(),
            path.display()
        );
        Ok(profile)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    name: String,
    #[serde(default, rename = "type")]
    machine_type: Option<String>,
    #[serde(default)]
    firmware: Option<String>,
    #[serde(default)]
    eeprom_settings: OrderedSettings,
}

/// JSON object of settings kept in document order
#[derive(Default)]
struct OrderedSettings(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedSettings;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of $n settings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => u8::from(b).to_string(),
                        other => {
                            return Err(de::Error::custom(format!(
                                "setting {} has unsupported value {}",
                                key, other
                            )))
                        }
                    };
                    entries.push((key, value));
                }
                Ok(OrderedSettings(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Turns a profile into the command sequence that applies it
#[derive(Debug, Clone)]
pub struct ProfileApplier<'a> {
    profile: &'a MachineProfile,
}

impl<'a> ProfileApplier<'a> {
    pub fn new(profile: &'a MachineProfile) -> Self {
        Self { profile }
    }

    /// `$n=value` lines followed by `$$`
    ///
    /// Enabling homing before the limits it depends on can trip the
    /// controller's validation, so a `$22=1` that precedes an enabled
    /// `$20` or `$21` is moved to just after the last of them. Nothing
    /// else is reordered.
    pub fn commands(&self) -> Vec<String> {
        let mut entries = self.profile.settings.entries();
        order_homing_after_limits(&mut entries);

        let mut commands: Vec<String> = entries
            .into_iter()
            .map(|(id, value)| format!("${}={}", id, value))
            .collect();
        commands.push("$$".to_string());
        commands
    }

    /// Human-readable description of each setting line
    pub fn describe(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|command| {
                let description = command
                    .strip_prefix('$')
                    .and_then(|rest| rest.split_once('='))
                    .and_then(|(id, _)| id.parse::<u16>().ok())
                    .and_then(GrblSetting::from_id)
                    .map(GrblSetting::description)
                    .unwrap_or("");
                if description.is_empty() {
                    command.clone()
                } else {
                    format!("{:<16} {}", command, description)
                }
            })
            .collect()
    }
}

fn is_enabled(value: &str) -> bool {
    value.trim().parse::<f64>().map(|v| v == 1.0).unwrap_or(false)
}

fn order_homing_after_limits(entries: &mut Vec<(u16, &str)>) {
    let Some(homing) = entries
        .iter()
        .position(|(id, value)| *id == HOMING_CYCLE && is_enabled(value))
    else {
        return;
    };

    let last_limit = entries
        .iter()
        .rposition(|(id, value)| (*id == SOFT_LIMITS || *id == HARD_LIMITS) && is_enabled(value));

    if let Some(last_limit) = last_limit {
        if homing < last_limit {
            let entry = entries.remove(homing);
            // last_limit shifted down by one after the removal
            entries.insert(last_limit, entry);
            tracing::debug!("Moved $22 after limit settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(pairs: &[(&str, &str)]) -> MachineProfile {
        let settings = EepromSettings::from_pairs(ControllerType::Grbl, pairs.iter().copied()).unwrap();
        MachineProfile::new("Test", "30x30", settings)
    }

    #[test]
    fn test_commands_end_with_dump() {
        let p = profile(&[("$0", "10"), ("$100", "200")]);
        assert_eq!(ProfileApplier::new(&p).commands(), vec!["$0=10", "$100=200", "$$"]);
    }

    #[test]
    fn test_natural_order_is_kept() {
        let p = profile(&[("$20", "1"), ("$21", "0"), ("$22", "1")]);
        assert_eq!(
            ProfileApplier::new(&p).commands(),
            vec!["$20=1", "$21=0", "$22=1", "$$"]
        );
    }

    #[test]
    fn test_homing_moves_after_enabled_limits() {
        let p = profile(&[("$22", "1"), ("$0", "10"), ("$20", "1"), ("$21", "1"), ("$100", "80")]);
        assert_eq!(
            ProfileApplier::new(&p).commands(),
            vec!["$0=10", "$20=1", "$21=1", "$22=1", "$100=80", "$$"]
        );
    }

    #[test]
    fn test_disabled_limits_do_not_move_homing() {
        let p = profile(&[("$22", "1"), ("$20", "0"), ("$21", "0")]);
        assert_eq!(
            ProfileApplier::new(&p).commands(),
            vec!["$22=1", "$20=0", "$21=0", "$$"]
        );
    }

    #[test]
    fn test_disabling_homing_is_not_reordered() {
        let p = profile(&[("$22", "0"), ("$20", "1")]);
        assert_eq!(ProfileApplier::new(&p).commands(), vec!["$22=0", "$20=1", "$$"]);
    }

    #[test]
    fn test_from_json_keeps_document_order() {
        let json = r#"{
            "name": "LongMill",
            "type": "MK2",
            "firmware": "grbl",
            "eepromSettings": { "$22": "1", "$100": 200, "$20": "1" }
        }"#;
        let p = MachineProfile::from_json(json).unwrap();
        assert_eq!(p.name, "LongMill");
        assert_eq!(p.machine_type, "MK2");
        assert_eq!(p.settings.entries(), vec![(22, "1"), (100, "200"), (20, "1")]);
        assert_eq!(
            ProfileApplier::new(&p).commands(),
            vec!["$100=200", "$20=1", "$22=1", "$$"]
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_firmware() {
        let json = r#"{ "name": "X", "firmware": "tinyg", "eepromSettings": {} }"#;
        assert!(MachineProfile::from_json(json).unwrap_err().is_firmware_error());
    }

    #[test]
    fn test_describe_names_grbl_settings() {
        let p = profile(&[("$22", "1")]);
        let lines = ProfileApplier::new(&p).describe();
        assert!(lines[0].contains("Homing cycle enable"));
        assert_eq!(lines[1], "$$");
    }
}
