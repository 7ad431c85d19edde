use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, SocketAddr};

/// Check if a port is available for binding on the given address
pub fn is_port_free(addr: IpAddr, port: u16) -> bool {
    let domain = match addr {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };
    let socket = match Socket::new(domain, Type::STREAM, None) {
        Ok(s) => s,
        Err(_) => return false,
    };

    // Note: We intentionally don't use set_reuse_address here.
    // While SO_REUSEADDR would avoid TIME_WAIT issues, it can give false positives
    // by reporting a port as "free" when another process is actively using it.
    // It's better to get accurate availability checks even if it means
    // occasionally skipping ports in TIME_WAIT state.

    let addr = SocketAddr::new(addr, port);
    socket.bind(&addr.into()).is_ok()
}
