use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;

use super::common;

pub fn execute(
    ids: &[String],
    hint: Option<u16>,
    probe: bool,
    export: Option<&Path>,
    command: &[String],
) -> Result<()> {
    let settings = common::load_settings()?;
    let mut block = common::claim_block(&settings, ids, hint, probe, export)?;

    println!(
        "{} {}-{}",
        "Holding ports".bold(),
        block.base_port().to_string().green(),
        (block.base_port() + settings.range_size - 1)
            .to_string()
            .green()
    );
    for (id, port) in block.ports() {
        println!("  {:<16} {}", id, port.to_string().cyan());
    }
    println!();

    // The block stays claimed for as long as the child runs
    let env = common::build_env_vars(&block);
    let status = Command::new(&command[0])
        .args(&command[1..])
        .envs(&env)
        .status()
        .with_context(|| format!("Failed to execute {}", command[0]))?;

    block.close();

    if !status.success() {
        bail!("Command exited with status: {}", status.code().unwrap_or(-1));
    }

    Ok(())
}
