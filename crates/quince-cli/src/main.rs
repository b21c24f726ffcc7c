//! `quince`: run QuinCe quality control over a dataset from the command line.
//!
//! Reads `quince.toml` (or the path given with `--settings`), which names the
//! instrument's sensors, routine configurations, run types, diagnostic links
//! and standard concentrations.
//!
//! ```
//! quince check
//! quince qc dataset.json > checked.json
//! quince flag dataset.json --ids 10,11 --flag B --comment "Pump failure"
//! quince decode 'SensorValues.RangeCheckRoutine_12_4_SST_4_40_;'
//! ```

mod settings;

use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use quince_core::{Flag, dataset::Dataset, message::decode_rebuild_codes};
use quince_engine::{
  AutoQcReport, CascadeEngine, CascadePlan, QcFailure, UserFlagChange,
  run_auto_qc,
};
use quince_routines::{RoutineConfiguration, RoutineKind};
use serde::Serialize;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "QuinCe quality control")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "quince.toml")]
  settings: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load every configuration file and report what was loaded.
  Check,

  /// Run auto-QC and data-reduction QC; print the updated dataset.
  Qc {
    /// JSON dataset.
    dataset: PathBuf,
  },

  /// Set a user flag on values and print the resulting cascade plan.
  Flag {
    /// JSON dataset.
    dataset: PathBuf,

    /// Sensor value ids.
    #[arg(long, value_delimiter = ',', required = true)]
    ids: Vec<i64>,

    /// Flag code (e.g. 4) or character (e.g. B).
    #[arg(long, value_parser = parse_flag)]
    flag: Flag,

    #[arg(long, default_value = "")]
    comment: String,
  },

  /// Decode rebuild codes and print their messages.
  Decode {
    codes: String,
  },
}

fn parse_flag(text: &str) -> Result<Flag, String> {
  let flag = match text.trim().parse::<i32>() {
    Ok(code) => Flag::try_from(code),
    Err(_) => {
      let mut chars = text.trim().chars();
      match (chars.next(), chars.next()) {
        (Some(c), None) => Flag::from_char(c),
        _ => return Err(format!("{text:?} is not a flag")),
      }
    }
  };
  flag.map_err(|e| e.to_string())
}

// ─── Output shapes ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct QcOutput<'a> {
  report:   &'a AutoQcReport,
  failures: &'a [QcFailure],
  dataset:  &'a Dataset,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.settings)?;
  let ctx = settings.context()?;

  match cli.command {
    Command::Check => {
      let groups = [
        ("sensor value", summary(&ctx.routines.sensor_values)),
        ("external standard", summary(&ctx.routines.external_standards)),
        ("data reduction", summary(&ctx.routines.data_reduction)),
      ];
      for (group, subjects) in groups {
        for (subject, count) in subjects {
          println!("{group}\t{subject}\t{count}");
        }
      }
      tracing::info!(run_types = ctx.run_types.len(), "configuration OK");
    }

    Command::Qc { dataset } => {
      let mut data = load_dataset(&dataset)?;
      let report = run_auto_qc(&ctx, &mut data).context("auto QC failed")?;
      let plan = CascadeEngine::new(&ctx)
        .plan_all(&data)
        .context("QC recompute failed")?;
      plan.apply(&mut data);
      print_json(&QcOutput {
        report:   &report,
        failures: &plan.failures,
        dataset:  &data,
      })?;
    }

    Command::Flag {
      dataset,
      ids,
      flag,
      comment,
    } => {
      let data = load_dataset(&dataset)?;
      let changes: Vec<UserFlagChange> = ids
        .into_iter()
        .map(|value_id| UserFlagChange {
          value_id,
          flag,
          comment: comment.clone(),
        })
        .collect();
      let plan: CascadePlan = CascadeEngine::new(&ctx)
        .plan(&data, &changes)
        .context("cascade failed")?;
      print_json(&plan)?;
    }

    Command::Decode { codes } => {
      let messages = decode_rebuild_codes(&codes).context("invalid rebuild codes")?;
      for message in messages {
        let text = ctx
          .routines
          .message_text(&message)
          .unwrap_or_else(|| message.message_class.clone());
        println!(
          "line {}\tcolumn {}\t{}\t{text}",
          message.line_number, message.column_index, message.flag
        );
      }
    }
  }

  Ok(())
}

/// Routine count per configured subject.
fn summary<R: RoutineKind + ?Sized>(
  configuration: &RoutineConfiguration<R>,
) -> Vec<(&str, usize)> {
  configuration
    .subjects()
    .map(|(subject, routines)| (subject, routines.len()))
    .collect()
}

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
  let text = fs::read_to_string(path)
    .with_context(|| format!("failed to read dataset {}", path.display()))?;
  serde_json::from_str(&text)
    .with_context(|| format!("invalid dataset {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("failed to serialise output")?;
  println!("{json}");
  Ok(())
}
