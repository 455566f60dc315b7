use crate::cmd::{block_on, select_motors, Overrides, Session};
use crate::output::print_json;
use anyhow::Context;
use clap::{Args, Subcommand, ValueEnum};
use poppy_core::engine::ExecReport;
use poppy_core::motor::LedColor;
use poppy_core::script::{Motion, MotorSelector, Script};
use poppy_core::Poppy;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct MotorArgs {
    /// Target motors: names, one alias, or `all`
    #[arg(short, long, num_args = 1.., required = true)]
    motor: Vec<String>,
}

#[derive(Args)]
pub struct MoveArgs {
    #[command(flatten)]
    motors: MotorArgs,

    /// Angle in degrees
    #[arg(long, allow_negative_numbers = true)]
    value: f64,

    /// Duration of the move in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Return once the move is expected to be over
    #[arg(long)]
    wait: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum ExecSubcommand {
    /// Make motors compliant (free to move by hand), or stiff with `--value off`
    Compliant {
        /// Target motors: names, one alias, or `all`
        #[arg(short, long, num_args = 1.., default_value = "all")]
        motor: Vec<String>,
        #[arg(long, value_enum, default_value = "on")]
        value: Toggle,
    },

    /// Make motors stiff (driven by the firmware)
    Stiff {
        /// Target motors: names, one alias, or `all`
        #[arg(short, long, num_args = 1.., default_value = "all")]
        motor: Vec<String>,
    },

    /// Set the rotation speed (0-1023, 0 is the fastest)
    Speed {
        #[command(flatten)]
        motors: MotorArgs,
        #[arg(long, value_parser = clap::value_parser!(u16).range(0..=1023))]
        value: u16,
    },

    /// Set the led color
    Led {
        #[command(flatten)]
        motors: MotorArgs,
        /// off, red, green, blue, yellow, cyan, pink or white
        #[arg(long, default_value = "off")]
        value: LedColor,
    },

    /// Move motors to an absolute position
    #[command(alias = "position")]
    Goto(MoveArgs),

    /// Rotate motors by an angle from their present position
    Rotate(MoveArgs),

    /// Run a YAML or JSON script file
    Script {
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    overrides: Overrides,
    subcmd: ExecSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::load(root, overrides)?;

    let report = block_on(async {
        let poppy = session.connect().await?;
        let script = match subcmd {
            ExecSubcommand::Compliant { motor, value } => {
                let script = Script::with_motors(select_motors(&poppy, &motor)?);
                match value {
                    Toggle::On => script.compliant(),
                    Toggle::Off => script.stiff(),
                }
            }
            ExecSubcommand::Stiff { motor } => {
                Script::with_motors(select_motors(&poppy, &motor)?).stiff()
            }
            ExecSubcommand::Speed { motors, value } => {
                Script::with_motors(select_motors(&poppy, &motors.motor)?).speed(value)
            }
            ExecSubcommand::Led { motors, value } => {
                Script::with_motors(select_motors(&poppy, &motors.motor)?).led(value)
            }
            ExecSubcommand::Goto(args) => {
                let motion = Motion {
                    duration: args.duration,
                    wait: args.wait,
                };
                Script::with_motors(select_motors(&poppy, &args.motors.motor)?)
                    .goto(args.value, motion)
            }
            ExecSubcommand::Rotate(args) => {
                let motion = Motion {
                    duration: args.duration,
                    wait: args.wait,
                };
                Script::with_motors(select_motors(&poppy, &args.motors.motor)?)
                    .rotate(args.value, motion)
            }
            ExecSubcommand::Script { file } => {
                let script = Script::load(&file)
                    .with_context(|| format!("failed to load script {}", file.display()))?;
                check_script_motors(&poppy, &script)?;
                script
            }
        };
        anyhow::Ok(poppy.exec(&[script]).await)
    })??;

    print_report(&report, json)
}

/// Reject a script naming motors the robot does not have, before anything runs.
fn check_script_motors(poppy: &Poppy, script: &Script) -> anyhow::Result<()> {
    for handler in script.handlers() {
        if let MotorSelector::Named(names) = &handler.motors {
            select_motors(poppy, names)?;
        }
    }
    Ok(())
}

fn print_report(report: &ExecReport, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(report)?;
    } else {
        for failure in &report.failures {
            println!(
                "[step {}] {} on {}: {}",
                failure.index, failure.action, failure.target, failure.message
            );
        }
        println!(
            "{} step(s) run in {} ms, {} failed",
            report.steps,
            report.elapsed.as_millis(),
            report.failures.len()
        );
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} steps failed",
            report.failures.len(),
            report.steps
        );
    }
    Ok(())
}
