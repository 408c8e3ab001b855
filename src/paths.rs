use anyhow::{Result, anyhow};
use std::{env, path::PathBuf};

#[derive(Clone)]
pub struct Paths {
    pub config: PathBuf,
}

/// `$XDG_CONFIG_HOME/.vup`, falling back to `$HOME/.config/.vup`.
pub fn vup_home() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME") {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(base.join(".vup"))
}

pub fn paths() -> Result<Paths> {
    let home = vup_home()?;
    Ok(Paths {
        config: home.join("config.toml"),
    })
}
