use log::{LevelFilter, error, info};
use std::error::Error;
use strumsync::Chart;
use strumsync::EngineConfig;
use strumsync::sim::{self, SimOptions, SimPlayer};

const DEFAULT_CONFIG_PATH: &str = "save/engine.ini";

struct Args {
    chart_path: String,
    config_path: String,
    bot: bool,
    seed: u64,
    jitter_ms: f64,
    miss_chance: f64,
}

const USAGE: &str = "usage: strumsync <chart.json> [config.ini] \
                     [--bot] [--seed N] [--jitter MS] [--miss-chance P]";

fn usage() -> String {
    USAGE.to_string()
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut positional = Vec::new();
    let mut bot = false;
    let mut seed = 0;
    let mut jitter_ms = 30.0;
    let mut miss_chance = 0.0;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bot" => bot = true,
            "--seed" => seed = args.next().ok_or_else(usage)?.parse()?,
            "--jitter" => jitter_ms = args.next().ok_or_else(usage)?.parse()?,
            "--miss-chance" => miss_chance = args.next().ok_or_else(usage)?.parse()?,
            "-h" | "--help" => return Err(usage().into()),
            other if other.starts_with("--") => {
                return Err(format!("unknown option '{}'\n{}", other, usage()).into());
            }
            other => positional.push(other.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    let chart_path = positional.next().ok_or_else(usage)?;
    let config_path = positional
        .next()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    Ok(Args {
        chart_path,
        config_path,
        bot,
        seed,
        jitter_ms,
        miss_chance,
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("strumsync::game::input", LevelFilter::Info)
        .filter_module("strumsync::game::timeline", LevelFilter::Warn)
        .init();

    let args = parse_args()?;
    info!("Loading chart '{}'...", args.chart_path);

    let chart = match Chart::from_path(&args.chart_path) {
        Ok(chart) => chart,
        Err(e) => {
            error!("Failed to load chart '{}': {}", args.chart_path, e);
            return Err(e.into());
        }
    };
    let config = EngineConfig::load(&args.config_path)?;

    let options = SimOptions {
        player: if args.bot || config.bot_play {
            SimPlayer::Bot
        } else {
            SimPlayer::Human {
                jitter_ms: args.jitter_ms,
                miss_chance: args.miss_chance,
            }
        },
        seed: args.seed,
        ..SimOptions::default()
    };

    let report = sim::run(&chart, &config, &options)?;
    info!(
        "Result: score {}, accuracy {:.2}%, misses {}, max combo {}, grade {}, full combo {:?}{}",
        report.score,
        report.accuracy * 100.0,
        report.misses,
        report.max_combo,
        report.grade,
        report.full_combo,
        if report.defeated { " (failed)" } else { "" }
    );
    Ok(())
}
