use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use fileshift::detection::{
    available_targets, category_for_name, content_type_for_name, default_target,
    output_file_name, validate_source,
};
use fileshift::{Category, ConversionOptions, ConversionWarning, SourceFile, Target};

/// Convert images, tabular data, and office documents between formats.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input file. Omit to read from stdin.
    #[arg()]
    file: Option<PathBuf>,

    /// Target format (e.g., png, json, pdf). Defaults to the category's usual target.
    #[arg(short, long, value_name = "FMT")]
    to: Option<String>,

    /// Conversion category. Inferred from the file extension when omitted.
    #[arg(short, long, value_enum)]
    category: Option<CategoryArg>,

    /// File name to use for stdin input; its extension selects the source format.
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Lossy image quality, 0-100.
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Write output to this path instead of next to the input.
    #[arg(short, long, value_name = "PATH", conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Write the converted bytes to stdout.
    #[arg(long)]
    stdout: bool,

    /// Print the formats the input can be converted to and exit.
    #[arg(long)]
    list_targets: bool,

    /// Log conversion details to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Image,
    Data,
    Document,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Image => Category::Image,
            CategoryArg::Data => Category::Data,
            CategoryArg::Document => Category::Document,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn print_warnings(warnings: &[ConversionWarning]) {
    for w in warnings {
        let loc = w
            .location
            .as_deref()
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        eprintln!("warning: [{:?}] {}{}", w.code, w.message, loc);
    }
}

fn read_source(cli: &Cli) -> Result<SourceFile, ExitCode> {
    match &cli.file {
        Some(path) => SourceFile::from_path(path).map_err(|e| {
            eprintln!("error: {}: {e}", path.display());
            ExitCode::from(1)
        }),
        None => {
            let name = cli.name.as_deref().ok_or_else(|| {
                eprintln!("error: --name is required when reading from stdin");
                ExitCode::from(2)
            })?;
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data).map_err(|e| {
                eprintln!("error: stdin: {e}");
                ExitCode::from(1)
            })?;
            let mut source = SourceFile::new(name, data);
            source.content_type = content_type_for_name(name).map(str::to_string);
            Ok(source)
        }
    }
}

fn resolve_target(cli: &Cli, category: Category, name: &str) -> Result<Target, ExitCode> {
    let target = match cli.to.as_deref() {
        Some(token) => Target::parse(category, token).map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(2)
        })?,
        None => default_target(category, name).ok_or_else(|| {
            eprintln!("error: {name}: no default target, pass --to");
            ExitCode::from(2)
        })?,
    };

    if !available_targets(category, name).contains(&target) {
        eprintln!("error: {name}: cannot convert to {target}");
        return Err(ExitCode::from(2));
    }
    Ok(target)
}

fn output_path(cli: &Cli, source: &SourceFile, target: Target) -> PathBuf {
    if let Some(path) = &cli.output {
        return path.clone();
    }
    let file_name = output_file_name(&source.name, target);
    cli.file
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

fn run(cli: Cli) -> Result<ExitCode, ExitCode> {
    let source = read_source(&cli)?;

    let category = cli
        .category
        .map(Category::from)
        .or_else(|| category_for_name(&source.name))
        .ok_or_else(|| {
            eprintln!(
                "error: {}: cannot infer category, pass --category",
                source.name
            );
            ExitCode::from(2)
        })?;

    if cli.list_targets {
        let mut stdout = io::stdout().lock();
        for target in available_targets(category, &source.name) {
            writeln!(stdout, "{target}\t{}", target.mime_type()).map_err(|e| {
                eprintln!("error: stdout: {e}");
                ExitCode::from(1)
            })?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut options = ConversionOptions::default();
    if let Some(percent) = cli.quality {
        options.quality = f32::from(percent) / 100.0;
    }

    validate_source(category, &source, options.max_input_bytes).map_err(|e| {
        eprintln!("error: {}: {e}", source.name);
        ExitCode::from(1)
    })?;

    let target = resolve_target(&cli, category, &source.name)?;

    let result = fileshift::convert(&source, target, &options).map_err(|e| {
        eprintln!("error: {}: {e}", source.name);
        ExitCode::from(1)
    })?;
    print_warnings(&result.warnings);

    if cli.stdout {
        io::stdout().write_all(&result.bytes).map_err(|e| {
            eprintln!("error: stdout: {e}");
            ExitCode::from(1)
        })?;
    } else {
        let path = output_path(&cli, &source, target);
        std::fs::write(&path, &result.bytes).map_err(|e| {
            eprintln!("error: {}: {e}", path.display());
            ExitCode::from(1)
        })?;
        eprintln!("wrote {} ({})", path.display(), result.mime_type);
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(code) => code,
    }
}
