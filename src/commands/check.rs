use anyhow::Result;
use colored::Colorize;
use std::net::IpAddr;

use portblock::ports::checker;

use super::common;

pub fn execute(port: u16, address: Option<IpAddr>) -> Result<()> {
    let address = match address {
        Some(address) => address,
        None => common::load_settings()?.address,
    };

    if checker::is_port_free(address, port) {
        println!("{} {} is free", "Port".bold(), port.to_string().green());
        Ok(())
    } else {
        println!("{} {} is in use", "Port".bold(), port.to_string().red());
        std::process::exit(1);
    }
}
