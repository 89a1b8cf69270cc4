// karl-api: Transport capability for Stadler Form Karl humidifiers on the local network.
//
// The encrypted Tuya framing lives behind the `Transport` trait; this crate
// owns the raw data-point value model that crosses that boundary and an
// in-memory appliance for tests and simulation.

pub mod dps;
pub mod error;
pub mod simulated;
pub mod transport;

pub use dps::{DpsPayload, DpsValue, ReportKind};
pub use error::Error;
pub use simulated::{SimulatedFactory, SimulatedTransport};
pub use transport::{ApplianceIdentity, Transport, TransportEvent, TransportFactory};
