use crate::cmd::{block_on, Overrides, Session};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use poppy_core::config::RcFile;
use poppy_core::descriptor::{discover_descriptor, Descriptor, WarnLevel};
use poppy_core::paths;
use poppy_core::request::{HttpRequestHandler, RequestHandler};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check the connection and print the robot topology
    Show,

    /// Discover the robot topology over the network
    Discover {
        /// Write the discovered descriptor to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Check the descriptor file and compare it with the live robot
    Validate,

    /// Persist the effective connection settings to .poppyrc
    Save,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    overrides: Overrides,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::load(root, overrides)?;
    match subcmd {
        ConfigSubcommand::Show => show(&session, json),
        ConfigSubcommand::Discover { save } => discover(&session, save.as_deref(), json),
        ConfigSubcommand::Validate => validate(&session, json),
        ConfigSubcommand::Save => save(root, &session),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ConnectionStatus {
    url: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn show(session: &Session, json: bool) -> anyhow::Result<()> {
    let (status, descriptor) = block_on(async {
        let settings = session.settings.clone().resolve().await;
        let handler = HttpRequestHandler::new(&settings)?;
        let status = match handler.get_aliases().await {
            Ok(_) => ConnectionStatus {
                url: settings.base_url(),
                reachable: true,
                error: None,
            },
            Err(e) => ConnectionStatus {
                url: settings.base_url(),
                reachable: false,
                error: Some(e.to_string()),
            },
        };
        let descriptor = match &session.descriptor {
            Some(path) => Some(Descriptor::load(path)?),
            None if status.reachable => {
                Some(discover_descriptor(&handler, &settings.host).await?)
            }
            None => None,
        };
        anyhow::Ok((status, descriptor))
    })??;

    if json {
        return print_json(&serde_json::json!({
            "connection": status,
            "descriptor": descriptor,
        }));
    }

    match &status.error {
        None => println!("Connection: {} (ok)", status.url),
        Some(e) => println!("Connection: {} (unreachable: {e})", status.url),
    }
    match &descriptor {
        Some(d) => print_tree(d),
        None => println!("No descriptor: robot unreachable and no --descriptor given."),
    }
    Ok(())
}

fn print_tree(descriptor: &Descriptor) {
    println!("Robot: {}", descriptor.name);
    if let Some(description) = &descriptor.description {
        println!("  {description}");
    }
    for alias in &descriptor.aliases {
        println!("  {}", alias.name);
        for name in &alias.motors {
            match descriptor.motor(name) {
                Some(m) => println!(
                    "    {:<12} {:<8} [{:.1}, {:.1}]",
                    m.name,
                    m.model.as_deref().unwrap_or("-"),
                    m.lower_limit,
                    m.upper_limit
                ),
                None => println!("    {name:<12} (missing)"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// discover
// ---------------------------------------------------------------------------

fn discover(session: &Session, save: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let descriptor = block_on(discover_live(session))??;

    if let Some(path) = save {
        descriptor
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        print_json(&descriptor)?;
    } else {
        print_tree(&descriptor);
        if let Some(path) = save {
            println!("Descriptor saved to {}", path.display());
        }
    }
    Ok(())
}

async fn discover_live(session: &Session) -> anyhow::Result<Descriptor> {
    let settings = session.settings.clone().resolve().await;
    let handler = HttpRequestHandler::new(&settings)?;
    discover_descriptor(&handler, &settings.host)
        .await
        .with_context(|| format!("failed to discover robot at {}", settings.base_url()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(session: &Session, json: bool) -> anyhow::Result<()> {
    let path = session
        .descriptor
        .as_deref()
        .context("no descriptor file configured: pass --descriptor or set it in .poppyrc")?;
    let stored = Descriptor::load(path)
        .with_context(|| format!("failed to load descriptor {}", path.display()))?;
    let warnings = stored.validate();
    let live = block_on(discover_live(session))??;
    let differences = stored.compare(&live);

    if json {
        print_json(&serde_json::json!({
            "warnings": warnings,
            "differences": differences,
        }))?;
    } else if warnings.is_empty() && differences.is_empty() {
        println!("Descriptor matches the robot. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
        for d in &differences {
            println!("[differs] {d}");
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors || !differences.is_empty() {
        anyhow::bail!("descriptor validation found problems");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// save
// ---------------------------------------------------------------------------

fn save(root: &Path, session: &Session) -> anyhow::Result<()> {
    let rc = RcFile {
        connection: session.settings.clone(),
        descriptor: session.descriptor.clone(),
    };
    rc.save(root).context("failed to write .poppyrc")?;
    println!("Settings saved to {}", paths::rc_path(root).display());
    Ok(())
}
