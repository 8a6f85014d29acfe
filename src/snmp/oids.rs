//! Static UPS-MIB (RFC 1628) object identifier tables and named groups.
//! All hardware addressing lives here; the rest of the crate refers to
//! values by semantic field name only.

use std::fmt;

/// One addressable object: a base identifier plus an explicit instance.
///
/// RFC 1628 mixes scalar objects (instance `.0`) and per-line table columns
/// (instance = one-based line index). Keeping the instance explicit avoids
/// the classic malformed-address bug where a table column is queried without
/// its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid {
    base: &'static str,
    instance: Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Instance {
    Scalar,
    Line(u32),
}

impl Oid {
    pub const fn scalar(base: &'static str) -> Self {
        Self { base, instance: Instance::Scalar }
    }

    pub const fn line(base: &'static str, index: u32) -> Self {
        Self { base, instance: Instance::Line(index) }
    }

    /// Dotted-numeric form as sent on the wire.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Instance::Scalar => write!(f, "{}.0", self.base),
            Instance::Line(n) => write!(f, "{}.{}", self.base, n),
        }
    }
}

/// A named, ordered set of objects fetched together in one round trip.
#[derive(Debug, Clone)]
pub struct OidGroup {
    name: &'static str,
    entries: Vec<(&'static str, Oid)>,
}

impl OidGroup {
    fn new(name: &'static str, entries: Vec<(&'static str, Oid)>) -> Self {
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[(&'static str, Oid)] {
        &self.entries
    }

    pub fn oids(&self) -> Vec<Oid> {
        self.entries.iter().map(|(_, oid)| *oid).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reverse lookup: the field name a response varbind belongs to.
    pub fn name_for(&self, oid: &Oid) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, o)| o == oid)
            .map(|(name, _)| *name)
    }
}

/// sysDescr, answered by any SNMP agent. Used for connectivity probes.
pub const SYS_DESCR: Oid = Oid::scalar("1.3.6.1.2.1.1.1");

/// upsIdent group (1.3.6.1.2.1.33.1.1).
pub fn identification() -> OidGroup {
    OidGroup::new(
        "identification",
        vec![
            ("manufacturer", Oid::scalar("1.3.6.1.2.1.33.1.1.1")),
            ("model", Oid::scalar("1.3.6.1.2.1.33.1.1.2")),
            ("ups_software_version", Oid::scalar("1.3.6.1.2.1.33.1.1.3")),
            ("agent_software_version", Oid::scalar("1.3.6.1.2.1.33.1.1.4")),
            ("name", Oid::scalar("1.3.6.1.2.1.33.1.1.5")),
            ("attached_devices", Oid::scalar("1.3.6.1.2.1.33.1.1.6")),
        ],
    )
}

/// upsBattery group (1.3.6.1.2.1.33.1.2).
pub fn battery() -> OidGroup {
    OidGroup::new(
        "battery",
        vec![
            ("status", Oid::scalar("1.3.6.1.2.1.33.1.2.1")),
            ("time_on_battery", Oid::scalar("1.3.6.1.2.1.33.1.2.2")),
            ("minutes_remaining", Oid::scalar("1.3.6.1.2.1.33.1.2.3")),
            ("charge_remaining", Oid::scalar("1.3.6.1.2.1.33.1.2.4")),
            ("voltage", Oid::scalar("1.3.6.1.2.1.33.1.2.5")), // 0.1 Volt DC
            ("current", Oid::scalar("1.3.6.1.2.1.33.1.2.6")), // 0.1 Amp DC
            ("temperature", Oid::scalar("1.3.6.1.2.1.33.1.2.7")), // degrees Celsius
        ],
    )
}

/// upsInput table columns (1.3.6.1.2.1.33.1.3) for one input line.
pub fn input(line: u32) -> OidGroup {
    OidGroup::new(
        "input",
        vec![
            ("input_num_lines", Oid::scalar("1.3.6.1.2.1.33.1.3.1")),
            ("input_frequency", Oid::line("1.3.6.1.2.1.33.1.3.3.1.2", line)), // 0.1 Hertz
            ("input_voltage", Oid::line("1.3.6.1.2.1.33.1.3.3.1.3", line)),   // RMS Volts
            ("input_current", Oid::line("1.3.6.1.2.1.33.1.3.3.1.4", line)),   // 0.1 RMS Amp
            ("input_true_power", Oid::line("1.3.6.1.2.1.33.1.3.3.1.5", line)), // Watts
        ],
    )
}

/// upsOutput group and table columns (1.3.6.1.2.1.33.1.4) for one line.
pub fn output(line: u32) -> OidGroup {
    OidGroup::new(
        "output",
        vec![
            ("output_source", Oid::scalar("1.3.6.1.2.1.33.1.4.1")),
            ("output_frequency", Oid::scalar("1.3.6.1.2.1.33.1.4.2")), // 0.1 Hertz
            ("output_num_lines", Oid::scalar("1.3.6.1.2.1.33.1.4.3")),
            ("output_voltage", Oid::line("1.3.6.1.2.1.33.1.4.4.1.2", line)), // RMS Volts
            ("output_current", Oid::line("1.3.6.1.2.1.33.1.4.4.1.3", line)), // 0.1 RMS Amp
            ("output_power", Oid::line("1.3.6.1.2.1.33.1.4.4.1.4", line)),   // Watts
            ("output_load", Oid::line("1.3.6.1.2.1.33.1.4.4.1.5", line)),    // percent
        ],
    )
}

/// upsBypass group and table columns (1.3.6.1.2.1.33.1.5) for one line.
pub fn bypass(line: u32) -> OidGroup {
    OidGroup::new(
        "bypass",
        vec![
            ("bypass_frequency", Oid::scalar("1.3.6.1.2.1.33.1.5.1")), // 0.1 Hertz
            ("bypass_num_lines", Oid::scalar("1.3.6.1.2.1.33.1.5.2")),
            ("bypass_voltage", Oid::line("1.3.6.1.2.1.33.1.5.3.1.2", line)),
            ("bypass_current", Oid::line("1.3.6.1.2.1.33.1.5.3.1.3", line)),
            ("bypass_power", Oid::line("1.3.6.1.2.1.33.1.5.3.1.4", line)),
        ],
    )
}

/// upsAlarm summary (1.3.6.1.2.1.33.1.6).
pub fn alarm() -> OidGroup {
    OidGroup::new(
        "alarm",
        vec![("present_alarms", Oid::scalar("1.3.6.1.2.1.33.1.6.1"))],
    )
}

/// upsAlarmTable columns (1.3.6.1.2.1.33.1.6.2) for one active alarm.
pub fn alarm_entry(index: u32) -> OidGroup {
    OidGroup::new(
        "alarm_entry",
        vec![
            ("alarm_id", Oid::line("1.3.6.1.2.1.33.1.6.2.1.1", index)),
            ("alarm_desc", Oid::line("1.3.6.1.2.1.33.1.6.2.1.2", index)),
            ("alarm_time", Oid::line("1.3.6.1.2.1.33.1.6.2.1.3", index)),
        ],
    )
}

/// upsTest group (1.3.6.1.2.1.33.1.7).
pub fn self_test() -> OidGroup {
    OidGroup::new(
        "test",
        vec![
            ("test_id", Oid::scalar("1.3.6.1.2.1.33.1.7.1")),
            ("spin_lock", Oid::scalar("1.3.6.1.2.1.33.1.7.2")),
            ("results_summary", Oid::scalar("1.3.6.1.2.1.33.1.7.3")),
            ("results_detail", Oid::scalar("1.3.6.1.2.1.33.1.7.4")),
            ("test_start_time", Oid::scalar("1.3.6.1.2.1.33.1.7.5")),
            ("test_elapsed_time", Oid::scalar("1.3.6.1.2.1.33.1.7.6")), // seconds
        ],
    )
}

/// upsControl group (1.3.6.1.2.1.33.1.8).
pub fn control() -> OidGroup {
    OidGroup::new(
        "control",
        vec![
            ("shutdown_type", Oid::scalar("1.3.6.1.2.1.33.1.8.1")),
            ("shutdown_after_delay", Oid::scalar("1.3.6.1.2.1.33.1.8.2")), // seconds
            ("startup_after_delay", Oid::scalar("1.3.6.1.2.1.33.1.8.3")),  // seconds
            ("reboot_with_duration", Oid::scalar("1.3.6.1.2.1.33.1.8.4")), // seconds
            ("auto_restart", Oid::scalar("1.3.6.1.2.1.33.1.8.5")),
        ],
    )
}

/// upsConfig group (1.3.6.1.2.1.33.1.9).
pub fn configuration() -> OidGroup {
    OidGroup::new(
        "configuration",
        vec![
            ("config_input_voltage", Oid::scalar("1.3.6.1.2.1.33.1.9.1")),
            ("config_input_frequency", Oid::scalar("1.3.6.1.2.1.33.1.9.2")),
            ("config_output_voltage", Oid::scalar("1.3.6.1.2.1.33.1.9.3")),
            ("config_output_frequency", Oid::scalar("1.3.6.1.2.1.33.1.9.4")),
            ("config_output_va", Oid::scalar("1.3.6.1.2.1.33.1.9.5")),
            ("config_output_power", Oid::scalar("1.3.6.1.2.1.33.1.9.6")),
            ("low_battery_time", Oid::scalar("1.3.6.1.2.1.33.1.9.7")), // minutes
            ("audible_alarm", Oid::scalar("1.3.6.1.2.1.33.1.9.8")),
            ("low_voltage_transfer_point", Oid::scalar("1.3.6.1.2.1.33.1.9.9")),
            ("high_voltage_transfer_point", Oid::scalar("1.3.6.1.2.1.33.1.9.10")),
        ],
    )
}

/// The curated set polled every cycle: full battery group plus the line-1
/// output/input essentials and the active alarm count.
pub fn essential() -> OidGroup {
    OidGroup::new(
        "essential",
        vec![
            ("status", Oid::scalar("1.3.6.1.2.1.33.1.2.1")),
            ("time_on_battery", Oid::scalar("1.3.6.1.2.1.33.1.2.2")),
            ("minutes_remaining", Oid::scalar("1.3.6.1.2.1.33.1.2.3")),
            ("charge_remaining", Oid::scalar("1.3.6.1.2.1.33.1.2.4")),
            ("voltage", Oid::scalar("1.3.6.1.2.1.33.1.2.5")),
            ("current", Oid::scalar("1.3.6.1.2.1.33.1.2.6")),
            ("temperature", Oid::scalar("1.3.6.1.2.1.33.1.2.7")),
            ("output_source", Oid::scalar("1.3.6.1.2.1.33.1.4.1")),
            ("output_voltage", Oid::line("1.3.6.1.2.1.33.1.4.4.1.2", 1)),
            ("output_power", Oid::line("1.3.6.1.2.1.33.1.4.4.1.4", 1)),
            ("output_load", Oid::line("1.3.6.1.2.1.33.1.4.4.1.5", 1)),
            ("input_voltage", Oid::line("1.3.6.1.2.1.33.1.3.3.1.3", 1)),
            ("input_frequency", Oid::line("1.3.6.1.2.1.33.1.3.3.1.2", 1)),
            ("present_alarms", Oid::scalar("1.3.6.1.2.1.33.1.6.1")),
        ],
    )
}

/// upsBatteryStatus enumeration.
pub fn battery_status_label(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("unknown"),
        2 => Some("batteryNormal"),
        3 => Some("batteryLow"),
        4 => Some("batteryDepleted"),
        _ => None,
    }
}

/// upsOutputSource enumeration.
pub fn output_source_label(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("other"),
        2 => Some("none"),
        3 => Some("normal"),
        4 => Some("bypass"),
        5 => Some("battery"),
        6 => Some("booster"),
        7 => Some("reducer"),
        _ => None,
    }
}

/// upsTestResultsSummary enumeration.
pub fn test_result_label(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("donePass"),
        2 => Some("doneWarning"),
        3 => Some("doneError"),
        4 => Some("aborted"),
        5 => Some("inProgress"),
        6 => Some("noTestsInitiated"),
        _ => None,
    }
}
