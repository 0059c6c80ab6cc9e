#![crate_type = "bin"]
#![recursion_limit = "1024"]

mod timedisplay;

use clap::Parser;
use colored::*;
use log::error;
use std::collections::HashMap;
use std::path::PathBuf;
use synrad::errors::*;
use synrad::generator::Generator;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Synchrotron-radiation event generator.
#[derive(Parser, Debug)]
#[command(name = "pysynrad", version = VERSION)]
struct Cli {
    /// JSON settings file describing the machine, lattice, and generator.
    config_file: PathBuf,

    /// A JSON object whose keys interpolate `$name`/`${name}` placeholders
    /// in the settings file before it is parsed.
    #[arg(short = 't', long = "template")]
    template: Option<String>,

    /// Show a progress bar, overriding `application.progress` in the
    /// settings file.
    #[arg(long)]
    progress: bool,
}

/// Parses the `--template` JSON object into the string-keyed/string-valued
/// map `Settings::load` substitutes with. Scalar values are rendered with
/// their natural `Display` (so `{"run": 17}` substitutes as `17`, not
/// `"17"`); objects and arrays are rejected.
fn parse_template_json(raw: &str) -> Result<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(raw).chain_err(|| "--template is not valid JSON")?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::from("--template must be a JSON object"))?;

    object
        .iter()
        .map(|(k, v)| {
            let rendered = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => return Err(Error::from(format!("--template key '{}' is null", k))),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(Error::from(format!("--template key '{}' is not a scalar", k)))
                }
                other => other.to_string(),
            };
            Ok((k.clone(), rendered))
        })
        .collect()
}

fn main() {
    env_logger::init();

    if let Err(ref e) = run() {
        error!("{}: {}", "error".red(), e);

        for e in e.iter().skip(1) {
            error!("caused by: {}", e);
        }

        if let Some(backtrace) = e.backtrace() {
            error!("backtrace: {:?}", backtrace);
        }

        std::process::exit(1);
    }

    std::process::exit(0);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let template_vars: HashMap<String, String> = match &cli.template {
        Some(raw) => parse_template_json(raw)?,
        None => HashMap::new(),
    };

    let start_time = time::now();

    let mut generator = Generator::initialize(&cli.config_file, &template_vars)
        .chain_err(|| "error during generator initialization")?;
    generator.force_progress(cli.progress);

    let result = generator.run();

    // Always try to close sinks cleanly, even if the run itself failed.
    generator.terminate().chain_err(|| "error while closing output sinks")?;
    result.chain_err(|| "error during event generation")?;

    let stop_time = time::now();
    println!(
        "Elapsed time: {}",
        timedisplay::pretty_print_duration(stop_time - start_time)
    );

    Ok(())
}
