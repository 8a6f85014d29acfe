//! Canonical per-poll status record: the unit of persistence.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::snmp::decode::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Error => write!(f, "error"),
        }
    }
}

/// One decoded, timestamped snapshot of a device. Built once per poll
/// cycle, immutable afterwards, written exactly once.
///
/// An `online` record carries decoded fields and no error; `offline` and
/// `error` records carry an error message and no fields.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub timestamp: String, // ISO-8601, second precision
    pub device_name: String,
    pub address: String,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl StatusRecord {
    pub fn online(name: &str, address: &str, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            timestamp: now_timestamp(),
            device_name: name.to_string(),
            address: address.to_string(),
            status: DeviceStatus::Online,
            error: None,
            fields,
        }
    }

    pub fn offline(name: &str, address: &str, message: &str) -> Self {
        Self {
            timestamp: now_timestamp(),
            device_name: name.to_string(),
            address: address.to_string(),
            status: DeviceStatus::Offline,
            error: Some(message.to_string()),
            fields: BTreeMap::new(),
        }
    }

    pub fn error(name: &str, address: &str, message: &str) -> Self {
        Self {
            timestamp: now_timestamp(),
            device_name: name.to_string(),
            address: address.to_string(),
            status: DeviceStatus::Error,
            error: Some(message.to_string()),
            fields: BTreeMap::new(),
        }
    }

    /// Flat (column, value) pairs in deterministic order: the fixed columns
    /// first, then decoded fields alphabetically.
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut columns = vec![
            ("timestamp".to_string(), self.timestamp.clone()),
            ("device_name".to_string(), self.device_name.clone()),
            ("address".to_string(), self.address.clone()),
            ("status".to_string(), self.status.to_string()),
            ("error".to_string(), self.error.clone().unwrap_or_default()),
        ];
        for (name, value) in &self.fields {
            columns.push((name.clone(), value.to_string()));
        }
        columns
    }

    fn field_text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// One-line operator summary for a routine successful poll.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{}:", self.device_name),
            format!("Battery: {}%", self.field_text("charge_remaining")),
            format!("Load: {}%", self.field_text("output_load")),
            format!("Output: {}V", self.field_text("output_voltage")),
            format!("Source: {}", self.field_text("output_source")),
        ];

        if let Some(FieldValue::Int(alarms)) = self.fields.get("present_alarms") {
            if *alarms > 0 {
                parts.push(format!("ALARMS: {}", alarms));
            }
        }

        parts.join(" | ")
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_fields() -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        fields.insert("charge_remaining".to_string(), FieldValue::Float(95.0));
        fields.insert("output_load".to_string(), FieldValue::Float(42.0));
        fields.insert("output_voltage".to_string(), FieldValue::Float(230.0));
        fields.insert("output_source".to_string(), FieldValue::Text("normal".to_string()));
        fields.insert("present_alarms".to_string(), FieldValue::Int(0));
        fields
    }

    #[test]
    fn online_record_has_fields_and_no_error() {
        let record = StatusRecord::online("10F_UPS", "172.21.2.13", online_fields());
        assert_eq!(record.status, DeviceStatus::Online);
        assert!(record.error.is_none());
        assert!(!record.fields.is_empty());
    }

    #[test]
    fn offline_record_has_error_and_no_fields() {
        let record = StatusRecord::offline("10F_UPS", "172.21.2.13", "no response");
        assert_eq!(record.status, DeviceStatus::Offline);
        assert_eq!(record.error.as_deref(), Some("no response"));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn columns_start_with_fixed_identity_fields() {
        let record = StatusRecord::online("10F_UPS", "172.21.2.13", online_fields());
        let columns = record.columns();
        let names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            &names[..5],
            &["timestamp", "device_name", "address", "status", "error"]
        );
        assert!(names.contains(&"charge_remaining"));
    }

    #[test]
    fn summary_lists_the_essentials() {
        let record = StatusRecord::online("10F_UPS", "172.21.2.13", online_fields());
        let summary = record.summary();
        assert!(summary.starts_with("10F_UPS:"));
        assert!(summary.contains("Battery: 95%"));
        assert!(summary.contains("Load: 42%"));
        assert!(summary.contains("Output: 230V"));
        assert!(summary.contains("Source: normal"));
        assert!(!summary.contains("ALARMS"));
    }

    #[test]
    fn summary_flags_active_alarms() {
        let mut fields = online_fields();
        fields.insert("present_alarms".to_string(), FieldValue::Int(2));
        let record = StatusRecord::online("10F_UPS", "172.21.2.13", fields);
        assert!(record.summary().contains("ALARMS: 2"));
    }

    #[test]
    fn serializes_flat_with_lowercase_status() {
        let record = StatusRecord::offline("10F_UPS", "172.21.2.13", "no response");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["error"], "no response");
        assert_eq!(json["device_name"], "10F_UPS");

        let record = StatusRecord::online("10F_UPS", "172.21.2.13", online_fields());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "online");
        assert!(json.get("error").is_none());
        assert_eq!(json["charge_remaining"], 95.0);
    }
}
