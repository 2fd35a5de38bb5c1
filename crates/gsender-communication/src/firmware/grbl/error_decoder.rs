//! Human-readable text for GRBL `error:n` and `ALARM:n` codes

/// Message for an `error:n` code
pub fn error_message(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "Expected command letter",
        2 => "Bad number format",
        3 => "Invalid '$' system command",
        4 => "Negative value for an expected positive value",
        5 => "Homing is not enabled in settings",
        6 => "Step pulse time must be at least 3 microseconds",
        7 => "EEPROM read failed, defaults restored",
        8 => "'$' command requires the Idle state",
        9 => "G-code locked out during alarm or jog state",
        10 => "Soft limits require homing to be enabled",
        11 => "Line exceeds the maximum line length",
        12 => "Setting exceeds the maximum step rate",
        13 => "Safety door opened",
        14 => "Build info or startup line too long",
        15 => "Jog target exceeds machine travel",
        16 => "Invalid jog command",
        17 => "Laser mode requires PWM output",
        20 => "Unsupported or invalid G-code command",
        21 => "More than one command from the same modal group",
        22 => "Feed rate has not been set",
        23 => "Command requires an integer value",
        24 => "More than one command requiring axis words",
        25 => "Repeated G-code word",
        26 => "Command requires axis words",
        27 => "Line number out of range",
        28 => "Command is missing a required P or L word",
        29 => "Unsupported work coordinate system",
        30 => "G53 requires G0 or G1 motion mode",
        31 => "Unused axis words with G80 active",
        32 => "Arc has no axis words in the selected plane",
        33 => "Invalid motion target",
        34 => "Arc radius definition is invalid",
        35 => "Arc offset definition is missing its IJK words",
        36 => "Unused G-code words in block",
        37 => "G43.1 offset is not on the tool length axis",
        38 => "Tool number exceeds the supported maximum",
        _ => return None,
    })
}

/// Message for an `ALARM:n` code
pub fn alarm_message(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "Hard limit triggered, re-homing recommended",
        2 => "Soft limit, motion target exceeds machine travel",
        3 => "Reset while in motion, re-homing recommended",
        4 => "Probe fail, probe not in expected initial state",
        5 => "Probe fail, no contact within programmed travel",
        6 => "Homing fail, reset during homing cycle",
        7 => "Homing fail, safety door opened during homing",
        8 => "Homing fail, could not clear limit switch on pull-off",
        9 => "Homing fail, limit switch not found",
        10 => "Limit switch engaged at homing start",
        11 => "Homing required",
        _ => return None,
    })
}

/// `error:n (message)` text for logs and hold reasons
pub fn format_error(code: u8) -> String {
    match error_message(code) {
        Some(message) => format!("error:{} ({})", code, message),
        None => format!("error:{}", code),
    }
}

/// `ALARM:n (message)` text for logs
pub fn format_alarm(code: u8) -> String {
    match alarm_message(code) {
        Some(message) => format!("ALARM:{} ({})", code, message),
        None => format!("ALARM:{}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(error_message(22), Some("Feed rate has not been set"));
        assert_eq!(alarm_message(1), Some("Hard limit triggered, re-homing recommended"));
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(error_message(200), None);
        assert_eq!(format_error(200), "error:200");
        assert_eq!(format_alarm(99), "ALARM:99");
    }

    #[test]
    fn test_format_error() {
        assert_eq!(format_error(20), "error:20 (Unsupported or invalid G-code command)");
    }
}
