//! Per-device poll loop: fetch, decode, assemble, persist, sleep.
//!
//! Every failure is terminal for the current cycle only; the loop always
//! schedules the next tick until shutdown is signaled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{error, info, warn};

use crate::datalog::DataLogger;
use crate::monitor::record::{DeviceStatus, StatusRecord};
use crate::monitor::shutdown::ShutdownSignal;
use crate::snmp::client::{DeviceClient, RawSample};
use crate::snmp::decode::decode_sample;
use crate::snmp::oids;

/// Poll a device once and build its canonical record. Faults inside
/// assembly surface as an `error` record, never as a panic or an Err.
pub async fn poll_device(client: &DeviceClient) -> StatusRecord {
    let sample = client.fetch_named(&oids::essential()).await;

    if sample.is_empty() {
        return StatusRecord::offline(client.name(), client.address(), "no response");
    }

    match assemble(client, &sample) {
        Ok(record) => record,
        Err(e) => StatusRecord::error(client.name(), client.address(), &format!("{:#}", e)),
    }
}

fn assemble(client: &DeviceClient, sample: &RawSample) -> Result<StatusRecord> {
    let fields = decode_sample(sample);
    if fields.is_empty() {
        bail!("response contained no decodable fields");
    }
    Ok(StatusRecord::online(client.name(), client.address(), fields))
}

pub struct DeviceMonitor {
    client: DeviceClient,
    logger: Arc<DataLogger>,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl DeviceMonitor {
    pub fn new(
        client: DeviceClient,
        logger: Arc<DataLogger>,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self { client, logger, interval, shutdown }
    }

    /// Run until the shutdown signal fires. The in-flight cycle always
    /// completes; only the inter-cycle sleep is interruptible.
    pub async fn run(self) {
        let name = self.client.name().to_string();
        info!("Monitoring loop started for {} ({})", name, self.client.address());

        if !self.client.test_connection().await {
            warn!(
                "Initial connection test failed for {} ({})",
                name,
                self.client.address()
            );
        }

        let mut last_status: Option<DeviceStatus> = None;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let record = poll_device(&self.client).await;

            if last_status != Some(record.status) {
                info!(
                    "{}: status changed from {} to {}",
                    name,
                    last_status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
                    record.status
                );
                last_status = Some(record.status);
            }

            match record.status {
                DeviceStatus::Online => info!("{}", record.summary()),
                _ => warn!(
                    "{}: {} - {}",
                    name,
                    record.status,
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            }

            if let Err(e) = self.logger.append(&name, &record).await {
                error!("Failed to log record for {}: {:#}", name, e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        info!("Monitoring loop stopped for {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::config::types::{DeviceConfig, LogFormat, LogSettings, SnmpSettings};
    use crate::monitor::shutdown;
    use crate::snmp::oids::Oid;
    use crate::snmp::transport::testing::ScriptedTransport;
    use crate::snmp::transport::RawValue;

    fn device(name: &str, address: &str) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            address: address.to_string(),
            port: 161,
            community: "public".to_string(),
            version: 2,
            timeout_secs: Some(1),
            retries: Some(0),
        }
    }

    fn defaults() -> SnmpSettings {
        SnmpSettings { timeout_secs: 1, retries: 0 }
    }

    fn healthy_transport(address: &str) -> ScriptedTransport {
        ScriptedTransport::new()
            .respond(address, &oids::SYS_DESCR, RawValue::Str("Smart-UPS".to_string()))
            .respond(address, &Oid::scalar("1.3.6.1.2.1.33.1.2.1"), RawValue::Int(2))
            .respond(address, &Oid::scalar("1.3.6.1.2.1.33.1.2.4"), RawValue::Int(95))
            .respond(address, &Oid::scalar("1.3.6.1.2.1.33.1.2.5"), RawValue::Int(247))
            .respond(address, &Oid::scalar("1.3.6.1.2.1.33.1.4.1"), RawValue::Int(3))
            .respond(
                address,
                &Oid::line("1.3.6.1.2.1.33.1.4.4.1.2", 1),
                RawValue::Int(230),
            )
            .respond(
                address,
                &Oid::line("1.3.6.1.2.1.33.1.4.4.1.5", 1),
                RawValue::Int(42),
            )
            .respond(address, &Oid::scalar("1.3.6.1.2.1.33.1.6.1"), RawValue::Int(0))
    }

    fn test_logger(dir: &TempDir) -> Arc<DataLogger> {
        Arc::new(
            DataLogger::new(&LogSettings {
                directory: dir.path().to_string_lossy().to_string(),
                format: LogFormat::Jsonl,
                rotation: false,
                max_size_mb: 10,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn healthy_device_polls_to_an_online_record() {
        let transport = Arc::new(healthy_transport("10.0.0.1"));
        let client = DeviceClient::new(&device("ups-a", "10.0.0.1"), &defaults(), transport);

        let record = poll_device(&client).await;
        assert_eq!(record.status, DeviceStatus::Online);
        assert!(record.error.is_none());
        assert_eq!(
            record.fields.get("battery_status"),
            Some(&crate::snmp::decode::FieldValue::Text("batteryNormal".to_string()))
        );
        assert_eq!(
            record.fields.get("voltage"),
            Some(&crate::snmp::decode::FieldValue::Float(24.7))
        );
    }

    #[tokio::test]
    async fn unreachable_device_polls_to_an_offline_record() {
        let transport = Arc::new(ScriptedTransport::new().failing("10.0.0.9"));
        let client = DeviceClient::new(&device("ups-z", "10.0.0.9"), &defaults(), transport);

        let record = poll_device(&client).await;
        assert_eq!(record.status, DeviceStatus::Offline);
        assert_eq!(record.error.as_deref(), Some("no response"));
        assert!(record.fields.is_empty());
    }

    #[tokio::test]
    async fn loop_writes_records_and_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir);
        let transport = Arc::new(healthy_transport("10.0.0.1"));
        let client = DeviceClient::new(&device("ups-a", "10.0.0.1"), &defaults(), transport);

        let (handle, signal) = shutdown::channel();
        let monitor = DeviceMonitor::new(
            client,
            Arc::clone(&logger),
            Duration::from_secs(3600),
            signal,
        );
        let task = tokio::spawn(monitor.run());

        // Give the first cycle time to complete, then signal shutdown
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.signal();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("engine should exit within one cycle of the signal")
            .unwrap();

        let latest = logger.latest_records("ups-a", 10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0]["status"].as_str(), Some("online"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_device_does_not_delay_the_others() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir);

        let mut transport = ScriptedTransport::new()
            .failing("10.0.0.200")
            .delayed("10.0.0.200", Duration::from_secs(30));
        for i in 1..=4 {
            let address = format!("10.0.0.{}", i);
            transport = transport
                .respond(&address, &oids::SYS_DESCR, RawValue::Str("UPS".to_string()))
                .respond(&address, &Oid::scalar("1.3.6.1.2.1.33.1.2.4"), RawValue::Int(90 + i));
        }
        let transport: Arc<ScriptedTransport> = Arc::new(transport);

        let (handle, _signal) = shutdown::channel();
        let mut tasks = Vec::new();
        for (name, address) in [
            ("ups-1", "10.0.0.1"),
            ("ups-2", "10.0.0.2"),
            ("ups-3", "10.0.0.3"),
            ("ups-4", "10.0.0.4"),
            ("ups-slow", "10.0.0.200"),
        ] {
            let client = DeviceClient::new(
                &device(name, address),
                &defaults(),
                Arc::clone(&transport) as Arc<dyn crate::snmp::SnmpTransport>,
            );
            let monitor = DeviceMonitor::new(
                client,
                Arc::clone(&logger),
                Duration::from_secs(3600),
                handle.subscribe(),
            );
            tasks.push(tokio::spawn(monitor.run()));
        }

        // The four healthy devices must deliver records while the slow
        // device is still stuck in its first request.
        tokio::time::sleep(Duration::from_millis(500)).await;
        for name in ["ups-1", "ups-2", "ups-3", "ups-4"] {
            let latest = logger.latest_records(name, 1).await.unwrap();
            assert_eq!(latest.len(), 1, "no record for {}", name);
            assert_eq!(latest[0]["status"].as_str(), Some("online"));
        }
        let slow = logger.latest_records("ups-slow", 1).await.unwrap();
        assert!(slow.is_empty(), "slow device should still be mid-request");

        handle.signal();
    }
}
