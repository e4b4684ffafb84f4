use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use litho::analysis::{self, ChartKind};
use litho::client::CompareOutcome;
use litho::error::ExportError;
use litho::logs::{LogCategory, LogTab};
use litho::model::StudyPreset;
use litho::result::{PlotImages, ResultPayload};
use litho::{export, matrix, App, Config, Lang, ModelKind, SineType};

#[derive(Parser)]
#[command(name = "litho", version, about = "Photoresist lithography simulation client")]
struct Cli {
    /// Base URL of the calculation API.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Interface language (zh or en). Also stored as the preference.
    #[arg(long, global = true)]
    lang: Option<String>,
    #[arg(long, global = true)]
    lang_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single calculation.
    Calculate(CalculateArgs),
    /// Compare several parameter sets.
    Compare(CompareArgs),
    /// Show or clear backend logs.
    Logs(LogsArgs),
    /// Print the model x dimension formula matrix.
    Matrix {
        #[arg(long)]
        index: Option<usize>,
    },
    /// Print the declared fields of a model.
    Schema {
        model: String,
        #[arg(long, default_value = "single")]
        sine: String,
    },
}

#[derive(Args)]
struct CalculateArgs {
    #[arg(long, default_value = "dill")]
    model: String,
    #[arg(long, default_value = "single")]
    sine: String,
    /// Field assignment, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    fields: Vec<String>,
    #[arg(long)]
    phase: Option<String>,
    /// Enable time animation (3D Dill and Enhanced Dill).
    #[arg(long)]
    animate: bool,
    /// Write CSV or PNG files here instead of printing figures.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct CompareArgs {
    #[arg(long, default_value = "dill")]
    model: String,
    #[arg(long)]
    study: Option<String>,
    /// Total number of sets to compare.
    #[arg(long)]
    sets: Option<usize>,
    #[arg(long = "set", value_name = "ID:KEY=VALUE")]
    fields: Vec<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct LogsArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value = "single")]
    page: String,
    #[arg(long)]
    clear: bool,
    /// Keep polling for this many seconds before printing.
    #[arg(long)]
    watch: Option<u64>,
}

fn parse_model(id: &str) -> Result<ModelKind> {
    ModelKind::from_id(id).ok_or_else(|| anyhow!("unknown model {:?}", id))
}

fn parse_sine(id: &str) -> Result<SineType> {
    SineType::from_id(id).ok_or_else(|| anyhow!("unknown sine type {:?}", id))
}

fn parse_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {:?}", raw))
}

fn build_app(cli: &Cli) -> Result<App> {
    let mut config = Config::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_api_base_url(url.as_str());
    }
    if let Some(path) = &cli.lang_file {
        config = config.with_lang_store_path(path);
    }
    let mut app = App::new(&config)?;
    if let Some(code) = &cli.lang {
        let lang = Lang::from_code(code).ok_or_else(|| anyhow!("unknown language {:?}", code))?;
        if lang != app.lang() {
            if let Err(e) = app.switch_language() {
                warn!("language preference not saved: {}", e);
            }
        }
    }
    Ok(app)
}

fn write_images(images: &PlotImages, dir: &Path) -> Result<()> {
    for (name, plot) in [
        ("exposure_plot", images.decode_exposure()?),
        ("thickness_plot", images.decode_thickness()?),
    ] {
        let path = dir.join(format!("{}.png", name));
        fs::write(&path, &plot.png).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {} ({}x{})", path.display(), plot.width, plot.height);
    }
    Ok(())
}

fn emit(app: &App, images: Option<&PlotImages>, out: Option<&Path>) -> Result<()> {
    let Some(dir) = out else {
        if images.is_some() {
            println!("{}", app.lang().text("fallback_images"));
        } else {
            println!("{}", serde_json::to_string_pretty(app.figures())?);
        }
        return Ok(());
    };
    fs::create_dir_all(dir)?;
    if let Some(images) = images {
        return write_images(images, dir);
    }
    for fig in app.figures() {
        match export::write_figure(fig, dir) {
            Ok(_) => {}
            Err(ExportError::Unsupported(name)) => warn!("{} has no CSV form, skipped", name),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn calculate(mut app: App, args: CalculateArgs) -> Result<()> {
    app.select_model(parse_model(&args.model)?);
    app.set_sine_type(parse_sine(&args.sine)?);
    if args.animate {
        app.set_animation(true);
    }
    if let Some(expr) = &args.phase {
        if !app.set_phase(expr) {
            bail!("{} takes no phase expression", args.sine);
        }
    }
    for raw in &args.fields {
        let (key, value) = parse_assignment(raw)?;
        let stored = app
            .edit_field(key, value)
            .ok_or_else(|| anyhow!("{} is not a field of {}", key, args.model))?;
        info!("{} = {}", key, stored);
    }
    app.calculate().await?;
    let images = match app.result() {
        Some(ResultPayload::Images(images)) => Some(images.clone()),
        _ => None,
    };
    emit(&app, images.as_ref(), args.out.as_deref())
}

async fn compare(mut app: App, args: CompareArgs) -> Result<()> {
    app.select_model(parse_model(&args.model)?);
    if let Some(id) = &args.study {
        let study = StudyPreset::from_id(id).ok_or_else(|| anyhow!("unknown study {:?}", id))?;
        app.apply_study(study);
    }
    while app.collection().len() < args.sets.unwrap_or(0) {
        app.add_set();
    }
    for raw in &args.fields {
        let (id, assignment) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("expected ID:KEY=VALUE, got {:?}", raw))?;
        let id: u32 = id.trim().parse().with_context(|| format!("bad set id in {:?}", raw))?;
        let (key, value) = parse_assignment(assignment)?;
        app.edit_set_field(id, key, value)?;
    }
    app.compare().await?;

    let lang = app.lang();
    let images = match app.comparison() {
        Some(CompareOutcome::Images(images)) => Some(images.clone()),
        Some(CompareOutcome::Data(data)) => {
            for kind in [ChartKind::Exposure, ChartKind::Thickness] {
                let series = match kind {
                    ChartKind::Exposure => &data.exposure,
                    ChartKind::Thickness => &data.thickness,
                };
                for ctl in app.thresholds().controls(kind) {
                    let (Some(s), Some(set)) = (series.get(ctl.index), app.collection().sets().get(ctl.index)) else {
                        continue;
                    };
                    for line in analysis::summary(lang, kind, &set.display_name(lang), &data.x, &s.data, ctl.value) {
                        eprintln!("{}", line);
                    }
                }
            }
            None
        }
        None => None,
    };
    emit(&app, images.as_ref(), args.out.as_deref())
}

async fn logs(mut app: App, args: LogsArgs) -> Result<()> {
    let category = match args.page.as_str() {
        "single" | "index" => LogCategory::Single,
        "compare" => LogCategory::Compare,
        other => bail!("unknown page {:?}", other),
    };
    let panel = app.logs_mut();
    panel.set_category(category);
    panel.set_tab(match &args.model {
        Some(id) => LogTab::Model(parse_model(id)?),
        None => LogTab::All,
    });
    if args.clear {
        panel.clear().await?;
        println!("{}", app.lang().text("logs_cleared"));
        return Ok(());
    }
    match args.watch {
        Some(secs) => {
            panel.start();
            tokio::time::sleep(Duration::from_secs(secs)).await;
            panel.stop();
        }
        None => {
            panel.refresh_now().await?;
        }
    }
    let panel = app.logs();
    for entry in panel.entries().iter().rev() {
        println!(
            "[{}] {:<8} {} {}",
            entry.timestamp,
            entry.kind.as_str(),
            entry.subcategory,
            entry.message
        );
    }
    if let Some(progress) = panel.progress() {
        println!("{}/{} ({:.0}%)", progress.done, progress.total, progress.percent());
    }
    Ok(())
}

fn print_matrix(lang: Lang, index: Option<usize>) -> Result<()> {
    let json = match index {
        Some(i) => {
            let entry = matrix::MATRIX
                .get(i)
                .ok_or_else(|| anyhow!("matrix has {} cells", matrix::MATRIX.len()))?;
            serde_json::to_string_pretty(&entry.localize(i, lang))?
        }
        None => serde_json::to_string_pretty(&matrix::cells(lang))?,
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = build_app(&cli)?;
    let lang = app.lang();
    match cli.command {
        Command::Calculate(args) => calculate(app, args).await,
        Command::Compare(args) => compare(app, args).await,
        Command::Logs(args) => logs(app, args).await,
        Command::Matrix { index } => print_matrix(lang, index),
        Command::Schema { model, sine } => {
            let schema = parse_model(&model)?.schema(parse_sine(&sine)?);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}
