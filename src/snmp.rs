//! SnmpTransport trait definition and submodule re-exports.

use async_trait::async_trait;

pub mod client;
pub mod decode;
pub mod oids;
pub mod transport;

pub use transport::NetSnmpTransport;

use oids::Oid;
use transport::{RawValue, SnmpTarget, TransportError};

/// The wire-level fetch capability the poll engine is built against.
///
/// One call is one request/response round trip carrying every requested
/// object. Implementations must return varbinds in request order, with
/// `None` for objects the device reported as not present.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    async fn query(
        &self,
        target: &SnmpTarget,
        oids: &[Oid],
    ) -> Result<Vec<(Oid, Option<RawValue>)>, TransportError>;
}
