use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use portblock::config::ClaimRecord;

use super::common;

pub fn execute(
    ids: &[String],
    hint: Option<u16>,
    probe: bool,
    export: Option<&Path>,
    json: bool,
) -> Result<()> {
    let settings = common::load_settings()?;
    let mut block = common::claim_block(&settings, ids, hint, probe, export)?;

    if json {
        let record = ClaimRecord::new(block.base_port(), block.ports().clone());
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "{} {}",
            "Claimed block at".bold(),
            block.base_port().to_string().green()
        );
        for (id, port) in block.ports() {
            println!("  {:<16} {}", id, port.to_string().cyan());
        }
        println!();
        println!(
            "{}",
            "The claim is released on exit; use `portblock run` to hold it."
                .dimmed()
        );
    }

    block.close();
    Ok(())
}
