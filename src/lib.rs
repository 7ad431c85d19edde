//! Collision-free TCP port blocks for tests and services.
//!
//! The kernel lets only one process bind a given port, so a single bound
//! "lock" socket works as a host-wide mutex for a whole block of ports.
//! [`Ports`] collects named reservations, [`BlockRegistrar`] finds and
//! claims a free block near a hint, and attached [`Exporter`]s can veto a
//! candidate block before it is frozen.
//!
//! ```no_run
//! use portblock::{BlockRegistrar, Ports};
//!
//! # fn main() -> Result<(), portblock::PortError> {
//! let mut ports = Ports::new(BlockRegistrar::localhost(10)?);
//! ports.reserve("web")?;
//! ports.reserve_at("db", 1)?;
//!
//! let block = ports.freeze(50000)?;
//! println!("web listens on {}", block.port("web")?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ports;

pub use error::PortError;
pub use ports::{
    BatchExporter, BlockRegistrar, ExportOutcome, Exporter, FreePortProbe, PortBlock, Ports,
    Registrar,
};
