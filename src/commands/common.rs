use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use portblock::config::{MergedSettings, RecordExporter};
use portblock::{BlockRegistrar, FreePortProbe, PortBlock, Ports};

/// Parse a reservation spec: NAME for a dynamic port, NAME:OFFSET for a
/// pinned one
pub fn parse_reservation(spec: &str) -> Result<(String, Option<u16>)> {
    match spec.split_once(':') {
        Some((id, offset)) => {
            let offset = offset
                .parse()
                .with_context(|| format!("Invalid offset in \"{}\"", spec))?;
            Ok((id.to_string(), Some(offset)))
        }
        None => Ok((spec.to_string(), None)),
    }
}

/// Load settings for the current directory's project
pub fn load_settings() -> Result<MergedSettings> {
    let cwd = std::env::current_dir()?;
    MergedSettings::load_from(&cwd)
}

/// Build the reservation ledger from CLI specs and freeze a block.
/// This is the shared logic between the `claim` and `run` commands.
pub fn claim_block(
    settings: &MergedSettings,
    ids: &[String],
    hint: Option<u16>,
    probe: bool,
    export: Option<&Path>,
) -> Result<PortBlock> {
    let registrar = BlockRegistrar::new(
        settings.address,
        settings.range_size,
        settings.lock_offset,
        settings.align_hint,
    )?;

    let mut ports = Ports::new(registrar);
    if probe {
        ports = ports.with_exporter(FreePortProbe::new(settings.address));
    }
    if let Some(path) = export {
        ports = ports.with_exporter(RecordExporter::new(path));
    }

    for spec in ids {
        let (id, offset) = parse_reservation(spec)?;
        match offset {
            Some(offset) => ports.reserve_at(&id, offset)?,
            None => ports.reserve(&id)?,
        }
    }

    let block = ports.freeze(hint.unwrap_or(settings.base_port_hint))?;
    Ok(block)
}

/// Environment variables handed to a command run inside a claimed block
pub fn build_env_vars(block: &PortBlock) -> HashMap<String, String> {
    let mut env = HashMap::new();

    env.insert("PORT_BASE".to_string(), block.base_port().to_string());
    for (id, port) in block.ports() {
        env.insert(format!("PORT_{}", env_name(id)), port.to_string());
    }

    env
}

fn env_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
