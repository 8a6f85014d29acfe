//! Per-device SNMP client: bundled fetches, single-object fetches, and
//! connectivity probes. All failures surface as empty or partial samples,
//! never as errors crossing into the poll loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::types::{DeviceConfig, SnmpSettings};
use crate::snmp::oids::{self, Oid, OidGroup};
use crate::snmp::transport::{RawValue, SnmpTarget};
use crate::snmp::SnmpTransport;

/// Raw values from one poll attempt, keyed by semantic field name.
/// Fields the device did not answer are simply missing.
#[derive(Debug, Clone, Default)]
pub struct RawSample {
    values: BTreeMap<String, RawValue>,
}

impl RawSample {
    pub fn insert(&mut self, name: &str, value: RawValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct DeviceClient {
    name: String,
    target: SnmpTarget,
    transport: Arc<dyn SnmpTransport>,
}

impl DeviceClient {
    pub fn new(
        device: &DeviceConfig,
        defaults: &SnmpSettings,
        transport: Arc<dyn SnmpTransport>,
    ) -> Self {
        Self {
            name: device.name.clone(),
            target: SnmpTarget::from_config(device, defaults),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.target.address
    }

    /// Fetch a named group in one bundled round trip.
    ///
    /// A transport or protocol failure yields an empty sample; an individual
    /// object missing from an otherwise successful response leaves only that
    /// field absent.
    pub async fn fetch_named(&self, group: &OidGroup) -> RawSample {
        let mut sample = RawSample::default();

        match self.transport.query(&self.target, &group.oids()).await {
            Ok(varbinds) => {
                for (oid, value) in varbinds {
                    let Some(field) = group.name_for(&oid) else {
                        continue;
                    };
                    match value {
                        Some(v) => sample.insert(field, v),
                        None => debug!(
                            "{}: object {} ({}) not present on device",
                            self.name, field, oid
                        ),
                    }
                }
                debug!(
                    "{}: {} of {} {} fields answered",
                    self.name,
                    sample.len(),
                    group.len(),
                    group.name()
                );
            }
            Err(e) => {
                warn!("SNMP {} group fetch failed for {}: {}", group.name(), self.name, e);
            }
        }

        sample
    }

    /// Fetch one object; `None` on any failure or absence.
    pub async fn fetch_one(&self, oid: &Oid) -> Option<RawValue> {
        match self.transport.query(&self.target, &[*oid]).await {
            Ok(varbinds) => varbinds.into_iter().next().and_then(|(_, v)| v),
            Err(e) => {
                debug!("SNMP get {} failed for {}: {}", oid, self.name, e);
                None
            }
        }
    }

    /// Probe connectivity with the standard sysDescr query.
    pub async fn test_connection(&self) -> bool {
        self.fetch_one(&oids::SYS_DESCR).await.is_some()
    }
}
