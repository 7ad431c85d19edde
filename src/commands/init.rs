use anyhow::{bail, Result};
use colored::Colorize;

use portblock::config::{paths, save_settings, Settings};

pub fn execute(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let settings_path = paths::settings_file_in(&root);

    if settings_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            settings_path.display()
        );
    }

    std::fs::create_dir_all(paths::project_config_dir_in(&root))?;
    save_settings(&Settings::default(), &root)?;

    println!("{} {}", "Created".green().bold(), settings_path.display());
    println!(
        "  {}",
        "Commit this file to share the block layout with your team.".dimmed()
    );

    Ok(())
}
