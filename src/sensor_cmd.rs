//! JSON-RPC command strings sent to a sensor over the VSP GATT link (spec §4.5).
//!
//! These are wire-format constants, not gateway policy — they must match
//! the sensor firmware's JSON-RPC dispatcher byte for byte.

pub const SET_PREFIX: &str = r#"{"jsonrpc":"2.0","id":0,"method":"set","params":"#;
pub const SUFFIX: &str = "}";

pub const DUMP: &str = r#"{"jsonrpc":"2.0","method":"dump","id":1}"#;
pub const REBOOT: &str = r#"{"jsonrpc": "2.0","method":"reboot","id":2}"#;
pub const ACCEPTED_SUB_STR: &str = r#""result":"ok""#;

pub const DEFAULT_QUERY: &str = concat!(
    r#"{"jsonrpc":"2.0","method":"get","id":4,"params":["#,
    r#""sensorName","hardwareMinorVersion","location","advertisingInterval","#,
    r#""advertisingDuration","connectionTimeout","passkey","lock","#,
    r#""batterySenseInterval","temperatureAggregationCount","temperatureSenseInterval","#,
    r#""highTemperatureAlarmThreshold1","highTemperatureAlarmThreshold2","#,
    r#""lowTemperatureAlarmThreshold1","lowTemperatureAlarmThreshold2","#,
    r#""deltaTemperatureAlarmTheshold","odr","scale","activationThreshold","#,
    r#""returnToSleepDuration","tempCc","batteryVoltageMv","magnetState","#,
    r#""highTemperatureAlarm","lowTemperatureAlarm","deltaTemperatureAlarm","#,
    r#""movementAlarm","hwVersion","firmwareVersion","resetReason","bluetoothAddress","#,
    r#""activeMode","flags","resetCount","useCodedPhy","txPower","networkId","#,
    r#""configVersion","bootloaderVersion"]}"#,
);

pub const SET_CONFIG_VERSION_1: &str = concat!(
    r#"{"jsonrpc":"2.0","method":"set","id":5,"params":{"activeMode":1,"scale":2,"#,
    r#""odr":5,"activationThreshold":8,"temperatureSenseInterval":120,"#,
    r#""batterySenseInterval":3600,"configVersion":1}}"#,
);

/// Attribute names which, if present in an outbound `set` command, force a
/// sensor reboot before the change takes effect — unless the sensor's
/// firmware major version is [`RESET_NOT_REQUIRED_MAJOR`] or greater.
pub const ATTRIBUTES_REQUIRING_RESET: &[&str] =
    &["sensorName", "advertisingInterval", "advertisingDuration", "passkey", "activeMode", "useCodedPhy"];

/// Firmware major version at and above which the sensor applies
/// configuration changes without needing a reboot.
pub const RESET_NOT_REQUIRED_MAJOR: u8 = 4;

/// `true` if `cmd` touches any attribute in [`ATTRIBUTES_REQUIRING_RESET`].
pub fn requires_reset(cmd: &str) -> bool {
    ATTRIBUTES_REQUIRING_RESET.iter().any(|attr| cmd.contains(attr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_reset_requiring_attribute() {
        assert!(requires_reset(r#"{"sensorName":"foo"}"#));
        assert!(requires_reset(r#"{"passkey":123456}"#));
        assert!(!requires_reset(r#"{"temperatureSenseInterval":120}"#));
    }

    #[test]
    fn dump_command_is_valid_json_rpc() {
        assert!(DUMP.contains(r#""method":"dump""#));
    }
}
