use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sheetsmith::{Theme, inspect_workbook, load_document, render};

#[derive(Parser)]
#[command(
    name = "sheetsmith",
    version,
    about = "Render workbook documents into styled xlsx files.",
    long_about = "sheetsmith turns a JSON workbook document (data sheets, column formats, KPIs, pivots and charts) into a formatted xlsx workbook with zebra striping, data bars, row highlights, a KPI dashboard and pivot charts."
)]
struct Cli {
    /// Show debug output (per-sheet and per-pivot decisions)
    #[arg(short = 'v', long = "verbose", global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a workbook document to xlsx
    Render(RenderArgs),
    /// List the sheets of an xlsx workbook with inferred column types
    Inspect(InspectArgs),
    /// List the available style themes and their palettes
    Themes,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON workbook document
    #[arg(value_name = "SPEC")]
    spec: PathBuf,

    /// Output xlsx path
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Style theme (Blue, Green, Gray, Orange; Portuguese names accepted)
    #[arg(short = 's', long = "style", value_name = "THEME", default_value = "Blue")]
    style: String,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Workbook to read back
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Themes => run_themes(),
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let theme: Theme = args.style.parse()?;
    let spec = load_document(&args.spec)
        .with_context(|| format!("failed loading {}", args.spec.display()))?;
    render(&spec, theme, &args.output)
        .with_context(|| format!("failed rendering {}", args.output.display()))?;
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let summaries = inspect_workbook(&args.file)
        .with_context(|| format!("failed to inspect workbook {}", args.file.display()))?;
    let mut output = BufWriter::new(io::stdout().lock());
    for summary in &summaries {
        writeln!(output, "{}", summary)?;
    }
    output.flush()?;
    Ok(())
}

fn run_themes() -> Result<()> {
    let mut output = BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "theme\theader_bg\tkpi_bg\tzebra\tnegative\tpositive\tscale_min\tscale_max"
    )?;
    for theme in Theme::ALL {
        let palette = theme.palette();
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            theme,
            palette.header_bg,
            palette.kpi_bg,
            palette.zebra,
            palette.negative_highlight,
            palette.positive_highlight,
            palette.scale_min,
            palette.scale_max
        )?;
    }
    output.flush()?;
    Ok(())
}
