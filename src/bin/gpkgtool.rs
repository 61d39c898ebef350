//! Command-line front end: convert CSV files to GeoPackage, validate
//! GeoPackages, and export layer attributes as text.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use gpkg_csv::crs::Crs;
use gpkg_csv::export::{DEFAULT_MAX_LINES, TEXT_EXPORT_LIMIT_BYTES, export_text};
use gpkg_csv::table::{ConvertOptions, DataType, GeometrySpec, convert_csv_file};
use gpkg_csv::validate::validate_gpkg;
use gpkg_csv::{Gpkg, GpkgLayerMetadata};

#[derive(Parser)]
#[command(
    name = "gpkgtool",
    version,
    about = "Convert CSV tables to GeoPackage layers and check GeoPackages before import"
)]
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file into a GeoPackage with one feature layer.
    ///
    /// Column types default to a guess from the header: `lat*`/`y` and
    /// `lon*`/`x` become coordinates, `geom`/`geometry`/`wkt` holds WKT, and
    /// everything else is text.
    Convert(ConvertArgs),

    /// Check GeoPackages for invalid geometries and column names.
    Validate {
        /// One or more .gpkg files.
        #[arg(value_name = "GPKG", required = true)]
        files: Vec<PathBuf>,
    },

    /// Print text columns of a layer as tab-separated lines.
    ExportText {
        #[arg(value_name = "GPKG")]
        file: PathBuf,

        /// Layer to export; defaults to the only layer of the file.
        #[arg(short, long)]
        layer: Option<String>,

        /// Column to export; repeat to export several.
        #[arg(short, long = "column", value_name = "COLUMN", required = true)]
        columns: Vec<String>,

        /// Maximum number of lines.
        #[arg(long, default_value_t = DEFAULT_MAX_LINES)]
        max_lines: usize,
    },

    /// List the layers of a GeoPackage.
    Layers {
        #[arg(value_name = "GPKG")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(value_name = "CSV")]
    input: PathBuf,

    /// Output file; defaults to the layer name with a .gpkg extension.
    #[arg(short, long, value_name = "GPKG")]
    output: Option<PathBuf>,

    /// Layer name; defaults to the slugified CSV file name.
    #[arg(long)]
    layer: Option<String>,

    /// CRS of the coordinates.
    #[arg(long, default_value = "EPSG:4326", value_parser = parse_crs)]
    crs: Crs,

    /// Field delimiter (`,`, `;`, `|`, `tab`); sniffed when omitted.
    #[arg(long, value_parser = parse_delimiter)]
    delimiter: Option<u8>,

    /// Column holding WKT geometries.
    #[arg(long, value_name = "COLUMN", conflicts_with_all = ["lat", "lon"])]
    wkt: Option<String>,

    /// Latitude column.
    #[arg(long, value_name = "COLUMN", requires = "lon")]
    lat: Option<String>,

    /// Longitude column.
    #[arg(long, value_name = "COLUMN", requires = "lat")]
    lon: Option<String>,

    /// Column type, e.g. `-t population=INT`; repeat for several columns.
    #[arg(short = 't', long = "type", value_name = "COLUMN=TYPE", value_parser = parse_column_type)]
    types: Vec<(String, DataType)>,

    /// Replace the output file if it exists.
    #[arg(long)]
    overwrite: bool,
}

fn parse_crs(s: &str) -> std::result::Result<Crs, String> {
    s.parse::<Crs>().map_err(|err| err.to_string())
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format!("expected a single ASCII character or 'tab', got '{s}'")),
    }
}

fn parse_column_type(s: &str) -> std::result::Result<(String, DataType), String> {
    let (column, data_type) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected COLUMN=TYPE, got '{s}'"))?;
    let data_type = data_type.parse::<DataType>().map_err(|err| err.to_string())?;
    Ok((column.to_string(), data_type))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Convert(args) => handle_convert(args),
        Commands::Validate { files } => handle_validate(&files),
        Commands::ExportText {
            file,
            layer,
            columns,
            max_lines,
        } => handle_export_text(&file, layer.as_deref(), &columns, max_lines),
        Commands::Layers { file } => handle_layers(&file),
    }
}

fn handle_convert(args: ConvertArgs) -> Result<ExitCode> {
    let geometry_spec = match (args.wkt, args.lat, args.lon) {
        (Some(column), _, _) => Some(GeometrySpec::Wkt(column)),
        (None, Some(latitude), Some(longitude)) => Some(GeometrySpec::LatLon {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let layer_name = args
        .layer
        .unwrap_or_else(|| gpkg_csv::table::layer_name_from_path(&args.input));
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{layer_name}.gpkg")));

    let options = ConvertOptions {
        delimiter: args.delimiter,
        crs: args.crs.to_string(),
        layer_name: Some(layer_name),
        column_types: args.types,
        geometry_spec,
        overwrite: args.overwrite,
    };
    debug!(?options, "convert options");
    info!("Converting {} to {}", args.input.display(), output.display());

    let summary = convert_csv_file(&args.input, &output, &options)
        .with_context(|| format!("failed to convert {}", args.input.display()))?;

    if summary.skipped > 0 {
        warn!(
            "Skipped {} rows with empty geometry; these rows will be missing from the output",
            summary.skipped
        );
    }
    info!(
        "Wrote {} rows to layer '{}'",
        summary.rows, summary.layer_name
    );
    println!("{}", summary.output.display());
    Ok(ExitCode::SUCCESS)
}

fn handle_validate(files: &[PathBuf]) -> Result<ExitCode> {
    let mut total_errors = 0;
    for file in files {
        info!("Validating {}...", file.display());
        let gpkg = Gpkg::open_read_only(file)
            .with_context(|| format!("failed to open {}", file.display()))?;
        let report = validate_gpkg(&gpkg)
            .with_context(|| format!("failed to validate {}", file.display()))?;

        println!("{}:", file.display());
        println!("{report}");
        total_errors += report.error_count();
    }

    Ok(if total_errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn handle_export_text(
    file: &Path,
    layer_name: Option<&str>,
    columns: &[String],
    max_lines: usize,
) -> Result<ExitCode> {
    let gpkg = Gpkg::open_read_only(file)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let layer_name = match layer_name {
        Some(name) => name.to_string(),
        None => {
            let mut layers = gpkg.list_layers()?;
            if layers.len() != 1 {
                bail!(
                    "{} has {} layers; choose one with --layer",
                    file.display(),
                    layers.len()
                );
            }
            layers.remove(0)
        }
    };
    let layer = gpkg
        .open_layer(&layer_name)
        .with_context(|| format!("failed to open layer '{layer_name}'"))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = export_text(&layer, columns, Some(max_lines), &mut out)?;
    out.flush()?;

    let size_kb = written as f64 / 1024.0;
    if written > TEXT_EXPORT_LIMIT_BYTES {
        warn!("Text size {size_kb:.1}kB exceeds the 32kB limit");
    } else {
        info!("Text size: {size_kb:.1}kB");
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_layers(file: &Path) -> Result<ExitCode> {
    let gpkg = Gpkg::open_read_only(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let layers = gpkg.layer_metadata()?;
    if layers.is_empty() {
        return Err(anyhow!("{} contains no layers", file.display()));
    }
    for layer in &layers {
        println!("{}", format_layer(layer));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_layer(layer: &GpkgLayerMetadata) -> String {
    let bounds = match layer.bounds {
        Some((min_x, min_y, max_x, max_y)) => format!("[{min_x}, {min_y}, {max_x}, {max_y}]"),
        None => "[]".to_string(),
    };
    format!(
        "{}\t{}\t{}\t{}",
        layer.table_name, layer.data_type, layer.srs, bounds
    )
}
