use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};

use hypcard::{load_hypcard_from, AcquisitionRegistry, DEFAULT_ACQUISITION_SYSTEM};

// ---------------------------------------------------------------------------
// CLI: inspect a capture
// ---------------------------------------------------------------------------

const USAGE: &str = "\
Usage: hypcard <HYPCard.bin> [options]

Options:
  --lazy           defer sample decoding (axes and metadata only)
  --json           print the metadata envelope as JSON
  --system NAME    acquisition system name (default: cambridge_attolight)
";

struct Args {
    path: PathBuf,
    lazy: bool,
    json: bool,
    system: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut path = None;
    let mut lazy = false;
    let mut json = false;
    let mut system = DEFAULT_ACQUISITION_SYSTEM.to_string();

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--lazy" => lazy = true,
            "--json" => json = true,
            "--system" => {
                system = argv.next().context("--system needs a value")?;
            }
            "-h" | "--help" => bail!("{USAGE}"),
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{USAGE}"),
            other => {
                if path.replace(PathBuf::from(other)).is_some() {
                    bail!("only one capture path is accepted\n\n{USAGE}");
                }
            }
        }
    }

    Ok(Args {
        path: path.with_context(|| format!("missing capture path\n\n{USAGE}"))?,
        lazy,
        json,
        system,
    })
}

fn run(args: &Args) -> anyhow::Result<()> {
    let registry = AcquisitionRegistry::builtin();
    let mut cube = load_hypcard_from(&args.path, args.lazy, &args.system, &registry)
        .with_context(|| format!("loading {}", args.path.display()))?;

    if args.json {
        println!("{}", cube.metadata.to_json()?);
        return Ok(());
    }

    let (ny, nx, channels) = cube.shape();
    println!("shape: {ny} x {nx} x {channels} (y, x, wavelength)");

    for axis in &cube.axes {
        println!(
            "axis {:<10} {:>5} points, scale {:.6} {}, offset {:.3}",
            axis.name, axis.size, axis.scale, axis.units, axis.offset
        );
    }

    if let Some(title) = cube.metadata.get_item("General.title") {
        println!("title: {title}");
    }
    match &cube.background {
        Some(bkg) => println!("background: {} points", bkg.counts.len()),
        None => println!("background: none"),
    }

    if !args.lazy {
        let data = cube.data()?;
        println!("total counts: {}", data.sum());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
