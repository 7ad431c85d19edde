pub mod checker;
pub mod exporter;
pub mod registrar;

pub use exporter::{BatchExporter, ExportOutcome, Exporter, FreePortProbe};
pub use registrar::{BlockRegistrar, Registrar};

use std::collections::{BTreeMap, HashSet};

use crate::error::PortError;

/// Offset of one reservation inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offset {
    /// Pinned by the caller
    Explicit(u16),
    /// Resolved at freeze time to the lowest free slot
    Dynamic,
}

#[derive(Debug)]
struct Reservation {
    id: String,
    offset: Offset,
}

/// Mutable reservation ledger.
///
/// Callers register named ports, then [`freeze`](Ports::freeze) claims a
/// block through the registrar and turns the ledger into an immutable
/// [`PortBlock`].
pub struct Ports {
    registrar: Box<dyn Registrar>,
    reservations: Vec<Reservation>,
    exporters: Vec<Box<dyn Exporter>>,
}

impl Ports {
    pub fn new(registrar: impl Registrar + 'static) -> Self {
        Self {
            registrar: Box::new(registrar),
            reservations: Vec::new(),
            exporters: Vec::new(),
        }
    }

    /// Attach an exporter. Exporters are driven in attach order and any of
    /// them can veto a candidate block.
    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }

    /// Reserve a port whose offset is picked at freeze time
    pub fn reserve(&mut self, id: &str) -> Result<(), PortError> {
        self.add(id, Offset::Dynamic)
    }

    /// Reserve a port at a fixed offset from the base port
    pub fn reserve_at(&mut self, id: &str, offset: u16) -> Result<(), PortError> {
        let range_size = self.registrar.range_size();
        if offset >= range_size {
            return Err(PortError::OffsetOutOfRange { offset, range_size });
        }
        if i32::from(offset) == self.registrar.lock_offset() {
            return Err(PortError::OffsetIsLockPort { offset });
        }
        self.add(id, Offset::Explicit(offset))
    }

    fn add(&mut self, id: &str, offset: Offset) -> Result<(), PortError> {
        if id.is_empty() {
            return Err(PortError::ReservedId);
        }
        if let Some(existing) = self.reservations.iter().find(|r| r.id == id) {
            if existing.offset == offset {
                // Re-declaring the identical reservation is a no-op
                return Ok(());
            }
            return Err(PortError::ConflictingReservation { id: id.to_string() });
        }
        if let Offset::Explicit(offset) = offset {
            if let Some(holder) = self
                .reservations
                .iter()
                .find(|r| r.offset == Offset::Explicit(offset))
            {
                return Err(PortError::OffsetTaken {
                    offset,
                    holder: holder.id.clone(),
                });
            }
        }
        self.reservations.push(Reservation {
            id: id.to_string(),
            offset,
        });
        Ok(())
    }

    /// Resolve every reservation to an offset, in registration order.
    /// Dynamic reservations take the lowest slot not pinned by an explicit
    /// one and not occupied by the lock port.
    fn resolve_offsets(&self) -> Result<Vec<(String, u16)>, PortError> {
        let range_size = self.registrar.range_size();
        let lock_offset = self.registrar.lock_offset();
        let pinned: HashSet<u16> = self
            .reservations
            .iter()
            .filter_map(|r| match r.offset {
                Offset::Explicit(offset) => Some(offset),
                Offset::Dynamic => None,
            })
            .collect();

        let mut resolved = Vec::with_capacity(self.reservations.len());
        let mut cursor: u16 = 0;
        for reservation in &self.reservations {
            let offset = match reservation.offset {
                Offset::Explicit(offset) => offset,
                Offset::Dynamic => {
                    while cursor < range_size
                        && (pinned.contains(&cursor) || i32::from(cursor) == lock_offset)
                    {
                        cursor += 1;
                    }
                    if cursor >= range_size {
                        return Err(PortError::BlockTooSmall {
                            reserved: self.reservations.len(),
                            range_size,
                        });
                    }
                    let offset = cursor;
                    cursor += 1;
                    offset
                }
            };
            resolved.push((reservation.id.clone(), offset));
        }
        Ok(resolved)
    }

    /// Claim a block near `base_port_hint`, resolve all reservations and
    /// freeze them into a [`PortBlock`].
    ///
    /// A vetoed candidate releases its claim and the search restarts one
    /// block further up, until the port space runs out.
    pub fn freeze(mut self, base_port_hint: u16) -> Result<PortBlock, PortError> {
        let offsets = self.resolve_offsets()?;
        let range_size = self.registrar.range_size();

        let mut hint = base_port_hint;
        loop {
            let base_port = self.registrar.lock(hint)?;

            match self.offer(base_port, &offsets) {
                None => {
                    for exporter in &mut self.exporters {
                        exporter.commit();
                    }
                    let ports = offsets
                        .iter()
                        .map(|(id, offset)| (id.clone(), base_port + offset))
                        .collect();
                    tracing::info!(base_port, "port block frozen");
                    return Ok(PortBlock {
                        base_port,
                        ports,
                        registrar: self.registrar,
                        closed: false,
                    });
                }
                Some((id, port, reason)) => {
                    tracing::debug!(id = %id, port, reason = %reason, "candidate block vetoed");
                    for exporter in &mut self.exporters {
                        exporter.rollback();
                    }
                    self.registrar.close();
                    hint = base_port
                        .checked_add(range_size)
                        .ok_or(PortError::PortSpaceExhausted)?;
                }
            }
        }
    }

    /// Offer every resolved pair to every exporter; the first veto wins.
    /// The base port goes out first, under the reserved empty id.
    fn offer(&mut self, base_port: u16, offsets: &[(String, u16)]) -> Option<(String, u16, String)> {
        for exporter in &mut self.exporters {
            if let ExportOutcome::Vetoed { reason } = exporter.notify("", base_port) {
                return Some((String::new(), base_port, reason));
            }
        }
        for (id, offset) in offsets {
            let port = base_port + offset;
            for exporter in &mut self.exporters {
                if let ExportOutcome::Vetoed { reason } = exporter.notify(id, port) {
                    return Some((id.clone(), port, reason));
                }
            }
        }
        None
    }
}

/// A claimed block with its resolved reservations.
///
/// The block stays claimed until [`close`](PortBlock::close) or drop.
pub struct PortBlock {
    base_port: u16,
    ports: BTreeMap<String, u16>,
    registrar: Box<dyn Registrar>,
    closed: bool,
}

impl std::fmt::Debug for PortBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortBlock")
            .field("base_port", &self.base_port)
            .field("ports", &self.ports)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl PortBlock {
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Look up the port resolved for a reservation
    pub fn port(&self, id: &str) -> Result<u16, PortError> {
        if self.closed {
            return Err(PortError::Closed);
        }
        self.ports
            .get(id)
            .copied()
            .ok_or_else(|| PortError::UnknownId(id.to_string()))
    }

    /// All resolved reservations, ordered by id
    pub fn ports(&self) -> &BTreeMap<String, u16> {
        &self.ports
    }

    /// Release the claim on the block. Idempotent.
    pub fn close(&mut self) {
        self.registrar.close();
        self.closed = true;
    }
}

impl Drop for PortBlock {
    fn drop(&mut self) {
        self.registrar.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::net::{IpAddr, Ipv4Addr, TcpListener};
    use std::rc::Rc;

    /// Registrar that hands out whatever the hint asks for, without
    /// touching any sockets
    struct FakeRegistrar {
        range_size: u16,
        lock_offset: i32,
        locked: bool,
        counters: Rc<RefCell<Counters>>,
    }

    #[derive(Default)]
    struct Counters {
        locks: usize,
        closes: usize,
    }

    impl FakeRegistrar {
        fn new(range_size: u16) -> Self {
            Self::with_lock_offset(range_size, -1)
        }

        fn with_lock_offset(range_size: u16, lock_offset: i32) -> Self {
            Self {
                range_size,
                lock_offset,
                locked: false,
                counters: Rc::new(RefCell::new(Counters::default())),
            }
        }

        fn counters(&self) -> Rc<RefCell<Counters>> {
            self.counters.clone()
        }
    }

    impl Registrar for FakeRegistrar {
        fn lock(&mut self, base_port_hint: u16) -> Result<u16, PortError> {
            assert!(!self.locked, "lock while already locked");
            self.locked = true;
            self.counters.borrow_mut().locks += 1;
            Ok(if base_port_hint == 0 {
                4000
            } else {
                base_port_hint
            })
        }

        fn close(&mut self) {
            if self.locked {
                self.counters.borrow_mut().closes += 1;
            }
            self.locked = false;
        }

        fn range_size(&self) -> u16 {
            self.range_size
        }

        fn lock_offset(&self) -> i32 {
            self.lock_offset
        }
    }

    #[test]
    fn test_dynamic_offsets_fill_around_explicit_ones() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve("foo").unwrap();
        ports.reserve_at("bar", 1).unwrap();
        ports.reserve("baz").unwrap();

        let block = ports.freeze(5000).unwrap();
        assert_eq!(block.base_port(), 5000);
        assert_eq!(block.port("bar").unwrap(), 5001);
        assert_eq!(block.port("foo").unwrap(), 5000);
        assert_eq!(block.port("baz").unwrap(), 5002);
    }

    #[test]
    fn test_dynamic_offsets_skip_in_range_lock_port() {
        let mut ports = Ports::new(FakeRegistrar::with_lock_offset(10, 0));
        ports.reserve("web").unwrap();

        let block = ports.freeze(5000).unwrap();
        // Offset 0 belongs to the lock port
        assert_eq!(block.port("web").unwrap(), 5001);
    }

    #[test]
    fn test_reserve_at_lock_port_offset_is_rejected() {
        let mut ports = Ports::new(FakeRegistrar::with_lock_offset(10, 0));
        assert!(matches!(
            ports.reserve_at("web", 0),
            Err(PortError::OffsetIsLockPort { offset: 0 })
        ));
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        assert!(matches!(ports.reserve(""), Err(PortError::ReservedId)));
        assert!(matches!(ports.reserve_at("", 1), Err(PortError::ReservedId)));
    }

    #[test]
    fn test_duplicate_explicit_offset_is_rejected() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve_at("web", 2).unwrap();
        let err = ports.reserve_at("db", 2).unwrap_err();
        assert!(matches!(err, PortError::OffsetTaken { offset: 2, .. }));
    }

    #[test]
    fn test_redeclaring_identical_reservation_is_a_noop() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve_at("web", 2).unwrap();
        ports.reserve_at("web", 2).unwrap();
        ports.reserve("db").unwrap();
        ports.reserve("db").unwrap();

        let block = ports.freeze(5000).unwrap();
        assert_eq!(block.ports().len(), 2);
    }

    #[test]
    fn test_redeclaring_with_different_offset_is_rejected() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve_at("web", 2).unwrap();
        assert!(matches!(
            ports.reserve_at("web", 3),
            Err(PortError::ConflictingReservation { .. })
        ));
        assert!(matches!(
            ports.reserve("web"),
            Err(PortError::ConflictingReservation { .. })
        ));
    }

    #[test]
    fn test_explicit_offset_must_fit_block() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        assert!(matches!(
            ports.reserve_at("web", 10),
            Err(PortError::OffsetOutOfRange { offset: 10, .. })
        ));
    }

    #[test]
    fn test_too_many_reservations_fail_before_locking() {
        let registrar = FakeRegistrar::new(2);
        let counters = registrar.counters();
        let mut ports = Ports::new(registrar);
        ports.reserve("a").unwrap();
        ports.reserve("b").unwrap();
        ports.reserve("c").unwrap();

        let err = ports.freeze(5000).unwrap_err();
        assert!(matches!(err, PortError::BlockTooSmall { reserved: 3, .. }));
        assert_eq!(counters.borrow().locks, 0);
    }

    #[test]
    fn test_unknown_id_lookup_fails() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve("web").unwrap();
        let block = ports.freeze(5000).unwrap();
        assert!(matches!(block.port("db"), Err(PortError::UnknownId(_))));
    }

    #[test]
    fn test_lookup_after_close_fails() {
        let mut ports = Ports::new(FakeRegistrar::new(10));
        ports.reserve("web").unwrap();
        let mut block = ports.freeze(5000).unwrap();
        assert_eq!(block.port("web").unwrap(), 5000);

        block.close();
        block.close(); // close stays idempotent
        assert!(matches!(block.port("web"), Err(PortError::Closed)));
    }

    #[test]
    fn test_veto_advances_to_next_block() {
        let registrar = FakeRegistrar::new(10);
        let counters = registrar.counters();
        let mut ports = Ports::new(registrar).with_exporter(|_id: &str, port: u16| {
            if port < 5020 {
                ExportOutcome::Vetoed {
                    reason: "in use".to_string(),
                }
            } else {
                ExportOutcome::Accepted
            }
        });
        ports.reserve("web").unwrap();

        let block = ports.freeze(5000).unwrap();
        assert_eq!(block.base_port(), 5020);
        // The two vetoed candidates released their claims
        assert_eq!(counters.borrow().closes, 2);
        assert_eq!(counters.borrow().locks, 3);
    }

    #[test]
    fn test_vetoing_everything_exhausts_port_space() {
        let mut ports = Ports::new(FakeRegistrar::new(10)).with_exporter(
            |_id: &str, _port: u16| ExportOutcome::Vetoed {
                reason: "never good enough".to_string(),
            },
        );
        ports.reserve("web").unwrap();

        // The retry loop walks off the top of the port space and stops
        let err = ports.freeze(5000).unwrap_err();
        assert!(matches!(err, PortError::PortSpaceExhausted));
    }

    #[test]
    fn test_exporters_see_base_port_first_in_registration_order() {
        let seen: Rc<RefCell<Vec<(String, u16)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut ports =
            Ports::new(FakeRegistrar::new(10)).with_exporter(move |id: &str, port: u16| {
                sink.borrow_mut().push((id.to_string(), port));
                ExportOutcome::Accepted
            });
        ports.reserve("zeta").unwrap();
        ports.reserve("alpha").unwrap();

        ports.freeze(5000).unwrap();
        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                ("".to_string(), 5000),
                ("zeta".to_string(), 5000),
                ("alpha".to_string(), 5001),
            ]
        );
    }

    #[test]
    fn test_batch_exporter_only_sees_winning_block() {
        let delivered: Rc<RefCell<Vec<std::sync::Arc<BTreeMap<String, u16>>>>> =
            Rc::new(RefCell::new(Vec::new()));
        let sink = delivered.clone();

        let mut ports = Ports::new(FakeRegistrar::new(10))
            .with_exporter(BatchExporter::new(move |map| sink.borrow_mut().push(map)))
            .with_exporter(|_id: &str, port: u16| {
                if port < 5010 {
                    ExportOutcome::Vetoed {
                        reason: "in use".to_string(),
                    }
                } else {
                    ExportOutcome::Accepted
                }
            });
        ports.reserve("web").unwrap();

        let block = ports.freeze(5000).unwrap();
        assert_eq!(block.base_port(), 5010);

        let delivered = delivered.borrow();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].get(""), Some(&5010));
        assert_eq!(delivered[0].get("web"), Some(&5010));
    }

    #[test]
    fn test_probe_veto_skips_occupied_block() {
        let hint = 61737;
        // Squat inside the first candidate block, on offset 3
        let _squatter = TcpListener::bind(("127.0.0.1", hint + 3)).unwrap();

        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let registrar = BlockRegistrar::new(localhost, 10, -1, false).unwrap();
        let mut ports = Ports::new(registrar).with_exporter(FreePortProbe::new(localhost));
        ports.reserve_at("web", 3).unwrap();

        let block = ports.freeze(hint).unwrap();
        assert_eq!(block.base_port(), hint + 10);
        assert_eq!(block.port("web").unwrap(), hint + 13);
    }
}
