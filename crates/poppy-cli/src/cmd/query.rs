use crate::cmd::{block_on, select_motors, Overrides, Session};
use crate::output::{format_value, print_json, print_table};
use clap::Args;
use poppy_core::poppy::QueryResult;
use poppy_core::script::MotorSelector;
use std::path::Path;

#[derive(Args)]
pub struct QueryArgs {
    /// Motors to read: names, one alias, or `all`
    #[arg(short, long, num_args = 1.., default_value = "all")]
    motor: Vec<String>,

    /// Registers to read
    #[arg(
        short,
        long,
        num_args = 1..,
        default_values = ["compliant", "lower_limit", "present_position", "upper_limit"]
    )]
    register: Vec<String>,

    /// One row per motor instead of one row per register
    #[arg(short, long)]
    invert: bool,
}

pub fn run(root: &Path, overrides: Overrides, args: QueryArgs, json: bool) -> anyhow::Result<()> {
    let session = Session::load(root, overrides)?;

    let (motors, result) = block_on(async {
        let poppy = session.connect().await?;
        let motors = select_motors(&poppy, &args.motor)?;
        let registers: Vec<&str> = args.register.iter().map(String::as_str).collect();
        let result = poppy
            .query(&MotorSelector::Named(motors.clone()), &registers)
            .await;
        anyhow::Ok((motors, result))
    })??;

    if json {
        return print_json(&result);
    }

    if args.invert {
        let mut headers = vec!["motor"];
        headers.extend(args.register.iter().map(String::as_str));
        let rows = motors
            .iter()
            .map(|m| {
                let mut row = vec![m.clone()];
                row.extend(
                    args.register
                        .iter()
                        .map(|r| format_value(lookup(&result, m, r))),
                );
                row
            })
            .collect();
        print_table(&headers, rows);
    } else {
        let mut headers = vec!["register"];
        headers.extend(motors.iter().map(String::as_str));
        let rows = args
            .register
            .iter()
            .map(|r| {
                let mut row = vec![r.clone()];
                row.extend(motors.iter().map(|m| format_value(lookup(&result, m, r))));
                row
            })
            .collect();
        print_table(&headers, rows);
    }
    Ok(())
}

fn lookup<'a>(
    result: &'a QueryResult,
    motor: &str,
    register: &str,
) -> Option<&'a serde_json::Value> {
    result
        .get(motor)
        .and_then(|registers| registers.get(register))
        .and_then(Option::as_ref)
}
