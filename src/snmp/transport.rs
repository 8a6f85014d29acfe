//! net-snmp subprocess transport.
//! Spawns `snmpget` with all requested OIDs bundled into one request and
//! parses its numeric (-On) output back into raw values.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::types::{DeviceConfig, SnmpSettings};
use crate::snmp::oids::Oid;
use crate::snmp::SnmpTransport;

/// One raw scalar as it came off the wire, before semantic decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no response after {retries} retries")]
    Timeout { retries: u32 },
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("protocol error status: {0}")]
    Protocol(String),
    #[error("failed to run snmpget: {0}")]
    Spawn(String),
}

/// Where and how to reach one device. Derived from [`DeviceConfig`] with the
/// fleet-wide SNMP defaults filled in.
#[derive(Debug, Clone)]
pub struct SnmpTarget {
    pub address: String,
    pub port: u16,
    pub community: String,
    pub version: u8,
    pub timeout: Duration,
    pub retries: u32,
}

impl SnmpTarget {
    pub fn from_config(device: &DeviceConfig, defaults: &SnmpSettings) -> Self {
        Self {
            address: device.address.clone(),
            port: device.port,
            community: device.community.clone(),
            version: device.version,
            timeout: Duration::from_secs(device.timeout_secs.unwrap_or(defaults.timeout_secs)),
            retries: device.retries.unwrap_or(defaults.retries),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    fn version_flag(&self) -> &'static str {
        if self.version == 1 {
            "1"
        } else {
            "2c"
        }
    }

    /// Hard ceiling on one bundled request: per-try timeout times every try
    /// the agent is allowed, plus scheduling slack for the subprocess.
    fn deadline(&self) -> Duration {
        self.timeout * (self.retries + 1) + Duration::from_secs(2)
    }
}

/// Production transport backed by the net-snmp `snmpget` binary.
pub struct NetSnmpTransport;

impl NetSnmpTransport {
    pub fn new() -> Self {
        Self
    }

    fn build_command(target: &SnmpTarget, oids: &[Oid]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("snmpget");
        cmd.args([
            "-v",
            target.version_flag(),
            "-c",
            &target.community,
            "-t",
            &target.timeout.as_secs().to_string(),
            "-r",
            &target.retries.to_string(),
            "-On",
            "-Oe",
        ]);
        cmd.arg(target.endpoint());
        for oid in oids {
            cmd.arg(oid.text());
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SnmpTransport for NetSnmpTransport {
    async fn query(
        &self,
        target: &SnmpTarget,
        oids: &[Oid],
    ) -> Result<Vec<(Oid, Option<RawValue>)>, TransportError> {
        let mut cmd = Self::build_command(target, oids);
        trace!("Executing: snmpget {:?}", cmd.as_std().get_args().collect::<Vec<_>>());

        let output = tokio::time::timeout(target.deadline(), cmd.output())
            .await
            .map_err(|_| TransportError::Timeout { retries: target.retries })?
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, target.retries));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let varbinds = parse_response(&stdout);
        debug!(
            "snmpget {}: {} of {} objects answered",
            target.endpoint(),
            varbinds.iter().filter(|(_, v)| v.is_some()).count(),
            oids.len()
        );

        Ok(oids
            .iter()
            .map(|oid| {
                let value = varbinds
                    .iter()
                    .find(|(resp_oid, _)| *resp_oid == oid.text())
                    .and_then(|(_, v)| v.clone());
                (*oid, value)
            })
            .collect())
    }
}

/// Map a failed snmpget run onto the transport failure taxonomy.
fn classify_failure(stderr: &str, retries: u32) -> TransportError {
    let first_line = stderr.lines().next().unwrap_or("").trim();

    if stderr.contains("Timeout") {
        TransportError::Timeout { retries }
    } else if stderr.contains("Error in packet") {
        let reason = stderr
            .lines()
            .find(|l| l.contains("Reason"))
            .unwrap_or(first_line)
            .trim();
        TransportError::Protocol(reason.to_string())
    } else if first_line.is_empty() {
        TransportError::Unreachable("snmpget exited with an error".to_string())
    } else {
        TransportError::Unreachable(first_line.to_string())
    }
}

/// Parse `snmpget -On` stdout into (numeric OID, value) pairs.
/// Multi-line string values are folded into the preceding varbind.
fn parse_response(stdout: &str) -> Vec<(String, Option<RawValue>)> {
    let mut varbinds: Vec<(String, Option<RawValue>)> = Vec::new();

    for line in stdout.lines() {
        if let Some((oid_part, value_part)) = line.split_once(" = ") {
            let oid = oid_part.trim().trim_start_matches('.').to_string();
            varbinds.push((oid, parse_value(value_part.trim())));
        } else if let Some((_, Some(RawValue::Str(prev)))) = varbinds.last_mut() {
            // Continuation of a wrapped string value
            prev.push('\n');
            prev.push_str(line.trim_end_matches('"'));
        }
    }

    varbinds
}

/// Parse one `TYPE: value` rendering. Unknown types fall back to the raw
/// text so decoding can still apply its own fallback policy.
fn parse_value(text: &str) -> Option<RawValue> {
    if text.starts_with("No Such Object") || text.starts_with("No Such Instance") {
        return None;
    }

    let Some((kind, value)) = text.split_once(": ") else {
        return Some(RawValue::Str(text.trim_matches('"').to_string()));
    };

    match kind {
        "INTEGER" | "Gauge32" | "Counter32" | "Counter64" | "Unsigned32" | "UInteger32" => {
            Some(parse_integer(value.trim()))
        }
        "Timeticks" => {
            // "(12345) 0:02:03.45", the tick count is authoritative
            let ticks = value
                .trim()
                .strip_prefix('(')
                .and_then(|rest| rest.split_once(')'))
                .and_then(|(n, _)| n.parse::<i64>().ok());
            match ticks {
                Some(n) => Some(RawValue::Int(n)),
                None => Some(RawValue::Str(value.trim().to_string())),
            }
        }
        "STRING" => Some(RawValue::Str(value.trim().trim_matches('"').to_string())),
        _ => Some(RawValue::Str(value.trim().to_string())),
    }
}

/// Integers may render bare ("3") or as an annotated enum ("batteryLow(3)").
fn parse_integer(value: &str) -> RawValue {
    if let Ok(n) = value.parse::<i64>() {
        return RawValue::Int(n);
    }
    let annotated = value
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .and_then(|n| n.parse::<i64>().ok());
    match annotated {
        Some(n) => RawValue::Int(n),
        None => RawValue::Str(value.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_varbinds() {
        let out = ".1.3.6.1.2.1.33.1.2.4.0 = INTEGER: 95\n";
        let parsed = parse_response(out);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, "1.3.6.1.2.1.33.1.2.4.0");
        assert_eq!(parsed[0].1, Some(RawValue::Int(95)));
    }

    #[test]
    fn parses_annotated_enum_integers() {
        let out = ".1.3.6.1.2.1.33.1.2.1.0 = INTEGER: batteryNormal(2)\n";
        let parsed = parse_response(out);
        assert_eq!(parsed[0].1, Some(RawValue::Int(2)));
    }

    #[test]
    fn parses_quoted_strings_and_gauges() {
        let out = concat!(
            ".1.3.6.1.2.1.1.1.0 = STRING: \"Smart-UPS 3000 RM\"\n",
            ".1.3.6.1.2.1.33.1.4.4.1.2.1 = Gauge32: 230\n",
        );
        let parsed = parse_response(out);
        assert_eq!(
            parsed[0].1,
            Some(RawValue::Str("Smart-UPS 3000 RM".to_string()))
        );
        assert_eq!(parsed[1].1, Some(RawValue::Int(230)));
    }

    #[test]
    fn parses_timeticks_count() {
        let out = ".1.3.6.1.2.1.33.1.2.2.0 = Timeticks: (4200) 0:00:42.00\n";
        let parsed = parse_response(out);
        assert_eq!(parsed[0].1, Some(RawValue::Int(4200)));
    }

    #[test]
    fn absent_objects_parse_as_none() {
        let out = concat!(
            ".1.3.6.1.2.1.33.1.2.4.0 = INTEGER: 95\n",
            ".1.3.6.1.2.1.33.1.2.7.0 = No Such Object available on this agent at this OID\n",
        );
        let parsed = parse_response(out);
        assert_eq!(parsed[0].1, Some(RawValue::Int(95)));
        assert_eq!(parsed[1].1, None);
    }

    #[test]
    fn classifies_timeout_stderr() {
        let err = classify_failure("Timeout: No Response from 172.21.2.13:161.\n", 3);
        assert!(matches!(err, TransportError::Timeout { retries: 3 }));
    }

    #[test]
    fn classifies_packet_errors() {
        let err = classify_failure(
            "Error in packet.\nReason: (noSuchName) There is no such variable name in this MIB.\n",
            3,
        );
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn classifies_unknown_host() {
        let err = classify_failure("snmpget: Unknown host (ups-nowhere)\n", 3);
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
