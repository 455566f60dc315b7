use anyhow::Context;
use poppy_core::config::RcFile;
use poppy_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let path = paths::rc_path(root);
    let data = serde_yaml::to_string(&RcFile::default()).context("failed to render .poppyrc")?;
    let created = io::write_if_missing(&path, data.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if created {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists, left untouched", path.display());
    }
    Ok(())
}
