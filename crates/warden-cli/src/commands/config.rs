/// Configuration management command handlers
use anyhow::Result;
use std::path::Path;
use warden_core::config::WardenConfig;

use super::helpers::load_config;

pub fn show() -> Result<()> {
    let config = load_config()?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", WardenConfig::default_path()?.display());
    Ok(())
}

pub fn init(force: bool) -> Result<()> {
    let path = WardenConfig::default_path()?;
    if write_default(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    WardenConfig::default().save(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_default_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path, false).unwrap());
        std::fs::write(&path, "cooldown_ms = 5000\n").unwrap();

        assert!(!write_default(&path, false).unwrap());
        assert_eq!(WardenConfig::load(&path).unwrap().cooldown_ms, 5000);

        assert!(write_default(&path, true).unwrap());
        assert_eq!(WardenConfig::load(&path).unwrap(), WardenConfig::default());
    }
}
