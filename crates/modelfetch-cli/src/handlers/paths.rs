//! Paths command handler.

use std::path::Path;

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Print the resolved directories in `key = value` form.
pub fn execute(ctx: &CliContext) -> Result<()> {
    print!("{}", render(ctx));
    Ok(())
}

fn render(ctx: &CliContext) -> String {
    let line = |key: &str, path: &Path| format!("{key:<9} = {}\n", path.display());
    let mut out = line("base", ctx.storage.base_dir());
    out.push_str(&line("downloads", &ctx.storage.downloads_dir()));
    out.push_str(&line("models", &ctx.storage.models_dir()));
    out
}
