use anyhow::{Context, Result};
use std::env;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

/// CLI command: open the configuration file in `$EDITOR` (default `vim`).
///
/// The current process is replaced by the editor, so this only returns on failure.
pub fn cmd_config(config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
    let mut cmd = Command::new(&editor);
    cmd.arg(config_path);

    // no swap files for vim-family editors
    if is_vim(&editor) {
        cmd.arg("-n");
    }

    let err = cmd.exec();
    Err(err).context(format!("failed to launch editor: {}", editor))
}

fn is_vim(editor: &str) -> bool {
    Path::new(editor)
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase().contains("vim"))
        .unwrap_or(false)
}
