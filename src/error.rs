use std::io;
use thiserror::Error;

/// Errors raised by the port-block allocator
#[derive(Debug, Error)]
pub enum PortError {
    /// A block must cover at least one port
    #[error("range size must be at least 1")]
    EmptyRange,

    /// The lock port must sit inside the block or directly next to it
    #[error("lock offset {offset} is outside -1..={range_size}")]
    LockOffsetOutOfRange { offset: i32, range_size: u16 },

    /// The empty id names the base port and cannot be reserved
    #[error("the empty reservation id is reserved for the base port")]
    ReservedId,

    /// Explicit offsets must fit inside the block
    #[error("offset {offset} does not fit into a block of {range_size} ports")]
    OffsetOutOfRange { offset: u16, range_size: u16 },

    /// The lock port itself is bound by the allocator and cannot be handed out
    #[error("offset {offset} is held by the lock port")]
    OffsetIsLockPort { offset: u16 },

    /// Two reservations may not share an explicit offset
    #[error("offset {offset} is already reserved by \"{holder}\"")]
    OffsetTaken { offset: u16, holder: String },

    /// An id was re-declared with a different offset specification
    #[error("\"{id}\" is already reserved with a different offset")]
    ConflictingReservation { id: String },

    /// More reservations than the block has ports
    #[error("{reserved} reservations do not fit into a block of {range_size} ports")]
    BlockTooSmall { reserved: usize, range_size: u16 },

    /// The bounded search ran off the top of the port space
    #[error("no free port block found below 65535")]
    PortSpaceExhausted,

    /// Lookup for an id that was never reserved
    #[error("no port named \"{0}\" was reserved")]
    UnknownId(String),

    /// Lookup on a block whose lock was already released
    #[error("port block was already closed")]
    Closed,

    /// A registrar holds at most one block at a time
    #[error("registrar already holds a locked block")]
    AlreadyLocked,

    #[error(transparent)]
    Io(#[from] io::Error),
}
