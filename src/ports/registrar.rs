use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::PortError;

/// First base port considered when the caller gives no hint.
/// Everything below is privileged or taken by system services.
const FIRST_USABLE_PORT: u32 = 1024;

/// Claims and releases a contiguous block of ports near a hint.
///
/// A claim is represented by a single bound "lock" socket; the kernel's
/// exclusive-bind guarantee makes it a host-wide mutex for the block.
pub trait Registrar {
    /// Claim a block whose base port is at or above `base_port_hint`.
    /// A hint of `0` lets the registrar pick any free block.
    fn lock(&mut self, base_port_hint: u16) -> Result<u16, PortError>;

    /// Release the claim, making the block available again. Idempotent.
    fn close(&mut self);

    /// Number of consecutive ports covered by one claim.
    fn range_size(&self) -> u16;

    /// Position of the lock port relative to the base port.
    fn lock_offset(&self) -> i32;
}

/// Registrar that walks the port space in `range_size` steps until a
/// block's lock port can be bound.
///
/// The lock offset may be anywhere from one below the block (-1) to one
/// past it (`range_size`); with the default of -1 the lock port sits just
/// below the block and every port inside it stays usable.
pub struct BlockRegistrar {
    addr: IpAddr,
    range_size: u16,
    lock_offset: i32,
    align_to_hint: bool,
    sentinel: Option<Socket>,
}

impl BlockRegistrar {
    pub fn new(
        addr: IpAddr,
        range_size: u16,
        lock_offset: i32,
        align_to_hint: bool,
    ) -> Result<Self, PortError> {
        if range_size == 0 {
            return Err(PortError::EmptyRange);
        }
        if lock_offset < -1 || lock_offset > i32::from(range_size) {
            return Err(PortError::LockOffsetOutOfRange {
                offset: lock_offset,
                range_size,
            });
        }
        Ok(Self {
            addr,
            range_size,
            lock_offset,
            align_to_hint,
            sentinel: None,
        })
    }

    /// Registrar on 127.0.0.1 with the lock port just below the block
    pub fn localhost(range_size: u16) -> Result<Self, PortError> {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), range_size, -1, false)
    }

    fn first_candidate(&self, hint: u16) -> u32 {
        if hint == 0 {
            // No hint: start at the bottom of the unprivileged range,
            // shifted up so a negative lock offset stays above it too
            return FIRST_USABLE_PORT + self.lock_offset.min(0).unsigned_abs();
        }
        if self.align_to_hint {
            let range = u32::from(self.range_size);
            // An already aligned hint is used as-is
            return u32::from(hint).div_ceil(range) * range;
        }
        u32::from(hint)
    }

    fn try_bind(&self, port: u16) -> std::io::Result<Socket> {
        let domain = match self.addr {
            IpAddr::V4(_) => Domain::IPV4,
            IpAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        // No set_reuse_address: a block in TIME_WAIT must count as taken,
        // its previous owner may still have services winding down on it
        let addr = SocketAddr::new(self.addr, port);
        socket.bind(&addr.into())?;
        socket.listen(1)?;
        Ok(socket)
    }
}

impl Registrar for BlockRegistrar {
    fn lock(&mut self, base_port_hint: u16) -> Result<u16, PortError> {
        if self.sentinel.is_some() {
            return Err(PortError::AlreadyLocked);
        }

        let mut candidate = self.first_candidate(base_port_hint);
        loop {
            // The whole block has to fit below the top of the port space
            if candidate + u32::from(self.range_size) - 1 > u32::from(u16::MAX) {
                return Err(PortError::PortSpaceExhausted);
            }
            let lock_port = candidate as i64 + i64::from(self.lock_offset);
            if lock_port > i64::from(u16::MAX) {
                // The lock port only moves up from here; no candidate left
                return Err(PortError::PortSpaceExhausted);
            }

            if lock_port >= 1 {
                match self.try_bind(lock_port as u16) {
                    Ok(socket) => {
                        tracing::debug!(base_port = candidate, lock_port, "claimed port block");
                        self.sentinel = Some(socket);
                        return Ok(candidate as u16);
                    }
                    Err(err) => {
                        tracing::trace!(lock_port, error = %err, "lock port taken, advancing");
                    }
                }
            }

            candidate += u32::from(self.range_size);
        }
    }

    fn close(&mut self) {
        if self.sentinel.take().is_some() {
            tracing::debug!("released port block");
        }
    }

    fn range_size(&self) -> u16 {
        self.range_size
    }

    fn lock_offset(&self) -> i32 {
        self.lock_offset
    }
}
