use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use inkflow::prelude::*;

const USAGE: &str = "Usage: inkflow [--preset ink|calm|vivid] [--config <file.json>] \
[--primary #rrggbb] [--secondary #rrggbb] [--reduced-motion] [--disabled]";

struct Args {
    preset: Option<String>,
    config_path: Option<PathBuf>,
    primary: Option<String>,
    secondary: Option<String>,
    reduced_motion: bool,
    disabled: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        preset: None,
        config_path: None,
        primary: None,
        secondary: None,
        reduced_motion: false,
        disabled: false,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--preset" => args.preset = Some(iter.next().ok_or("--preset needs a name")?),
            "--config" => args.config_path = Some(PathBuf::from(iter.next().ok_or("--config needs a path")?)),
            "--primary" => args.primary = Some(iter.next().ok_or("--primary needs a colour")?),
            "--secondary" => args.secondary = Some(iter.next().ok_or("--secondary needs a colour")?),
            "--reduced-motion" => args.reduced_motion = true,
            "--disabled" => args.disabled = true,
            other => return Err(format!("Unknown argument '{}'", other)),
        }
    }
    Ok(args)
}

fn load_config(args: &Args) -> SimulationConfig {
    if let Some(path) = &args.config_path {
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| SimulationConfig::from_json(&json).map_err(|e| e.to_string()));
        match loaded {
            Ok(config) => return config,
            Err(e) => log::error!("Failed to load config from {:?}: {}. Using defaults.", path, e),
        }
    }
    match args.preset.as_deref() {
        Some(name) => SimulationConfig::preset(name).unwrap_or_else(|| {
            log::warn!("Unknown preset '{}', using 'ink'", name);
            SimulationConfig::ink()
        }),
        None => SimulationConfig::default(),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    let config = load_config(&args);
    let options = HostOptions {
        enabled: !args.disabled,
        reduced_motion: args.reduced_motion,
        ..HostOptions::default()
    };
    let palette = Palette::from_hex(args.primary.as_deref(), args.secondary.as_deref());

    let result = Backdrop::new()
        .with_config(config)
        .with_options(options)
        .with_palette(palette)
        .run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
