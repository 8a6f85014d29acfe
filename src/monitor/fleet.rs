//! Fleet coordinator: owns one poll engine per configured device and the
//! shared shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::types::{DeviceConfig, SnmpSettings};
use crate::datalog::DataLogger;
use crate::monitor::engine::DeviceMonitor;
use crate::monitor::shutdown::{self, ShutdownHandle};
use crate::snmp::client::DeviceClient;
use crate::snmp::SnmpTransport;

/// Gap between engine launches so the fleet's first polls do not all hit
/// the network at once.
const LAUNCH_STAGGER: Duration = Duration::from_millis(500);

/// How long `stop` waits for each engine to finish its in-flight cycle.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct MonitorFleet {
    logger: Arc<DataLogger>,
    transport: Arc<dyn SnmpTransport>,
    snmp_defaults: SnmpSettings,
    poll_interval: Duration,
    shutdown: ShutdownHandle,
    engines: Vec<(String, JoinHandle<()>)>,
}

impl MonitorFleet {
    pub fn new(
        logger: Arc<DataLogger>,
        transport: Arc<dyn SnmpTransport>,
        snmp_defaults: SnmpSettings,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, _) = shutdown::channel();
        Self {
            logger,
            transport,
            snmp_defaults,
            poll_interval,
            shutdown,
            engines: Vec::new(),
        }
    }

    /// Launch one poll engine per device, staggered.
    pub async fn start(&mut self, devices: &[DeviceConfig]) {
        for device in devices {
            let client = DeviceClient::new(
                device,
                &self.snmp_defaults,
                Arc::clone(&self.transport),
            );
            let monitor = DeviceMonitor::new(
                client,
                Arc::clone(&self.logger),
                self.poll_interval,
                self.shutdown.subscribe(),
            );

            let handle = tokio::spawn(monitor.run());
            self.engines.push((device.name.clone(), handle));
            info!(
                "Started monitoring task for {} ({})",
                device.name, device.address
            );
            tokio::time::sleep(LAUNCH_STAGGER).await;
        }

        info!("All {} monitoring tasks started", self.engines.len());
    }

    /// Signal shutdown once and wait for every engine, each with a bounded
    /// grace period. Safe to call again; later calls find nothing to join.
    pub async fn stop(&mut self) {
        if self.engines.is_empty() {
            return;
        }
        info!("Shutting down monitoring fleet...");
        self.shutdown.signal();

        for (name, handle) in self.engines.drain(..) {
            match tokio::time::timeout(STOP_GRACE, handle).await {
                Ok(Ok(())) => debug!("Engine {} stopped", name),
                Ok(Err(e)) => error!("Engine {} terminated abnormally: {}", name, e),
                Err(_) => warn!(
                    "Engine {} did not stop within {:?}; leaving it to finish",
                    name, STOP_GRACE
                ),
            }
        }

        info!("All monitoring tasks stopped");
    }
}
