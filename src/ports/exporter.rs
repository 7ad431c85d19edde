use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use super::checker;

/// Result of offering one resolved id/port pair to an exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Accepted,
    /// Rejects the whole candidate block; the allocator moves on to the
    /// next one
    Vetoed { reason: String },
}

/// Sink for resolved id/port pairs.
///
/// During a freeze, every resolved id (the empty id carries the base port)
/// is offered to each exporter in turn. A single veto abandons the
/// candidate block and voids everything delivered for it so far.
pub trait Exporter {
    fn notify(&mut self, id: &str, port: u16) -> ExportOutcome;

    /// Called once after every pair of the winning block was accepted
    fn commit(&mut self) {}

    /// Called when the candidate block was vetoed
    fn rollback(&mut self) {}
}

impl<F> Exporter for F
where
    F: FnMut(&str, u16) -> ExportOutcome,
{
    fn notify(&mut self, id: &str, port: u16) -> ExportOutcome {
        self(id, port)
    }
}

/// Exporter that withholds pairs until the block is final and then
/// delivers the complete map in one call.
///
/// Observers never see a half-populated map, and the delivered map cannot
/// be mutated afterwards.
pub struct BatchExporter {
    pending: BTreeMap<String, u16>,
    deliver: Box<dyn FnMut(Arc<BTreeMap<String, u16>>)>,
}

impl BatchExporter {
    pub fn new(deliver: impl FnMut(Arc<BTreeMap<String, u16>>) + 'static) -> Self {
        Self {
            pending: BTreeMap::new(),
            deliver: Box::new(deliver),
        }
    }
}

impl Exporter for BatchExporter {
    fn notify(&mut self, id: &str, port: u16) -> ExportOutcome {
        self.pending.insert(id.to_string(), port);
        ExportOutcome::Accepted
    }

    fn commit(&mut self) {
        let map = Arc::new(std::mem::take(&mut self.pending));
        (self.deliver)(map);
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }
}

/// Exporter that probes every candidate port and vetoes blocks where one
/// is already taken by another process.
///
/// Only meaningful when the lock port sits outside the block (lock offset
/// -1 or `range_size`); an in-range lock port is bound by the allocator
/// itself and would veto its own claim.
pub struct FreePortProbe {
    addr: IpAddr,
}

impl FreePortProbe {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }
}

impl Exporter for FreePortProbe {
    fn notify(&mut self, id: &str, port: u16) -> ExportOutcome {
        if checker::is_port_free(self.addr, port) {
            ExportOutcome::Accepted
        } else {
            tracing::debug!(id = %id, port, "port already in use, vetoing block");
            ExportOutcome::Vetoed {
                reason: format!("port {} is in use", port),
            }
        }
    }
}
