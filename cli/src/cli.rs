use std::path::PathBuf;

/// Reduced scale model tools (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "rsm", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run configuration (TOML); defaults apply when omitted
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Overwrite existing output files
    #[arg(long, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Cluster fine zones into aggregate zones
    Aggregate(AggregateArgs),

    /// Choose households to resimulate
    Sample(SampleArgs),

    /// Merge resimulated trips into the archived full run
    Assemble(AssembleArgs),

    /// Aggregate zone-to-zone matrices to the cluster system
    Translate(TranslateArgs),
}

#[derive(clap::Args, Debug)]
pub struct AggregateArgs {
    /// Fine zone attribute table (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub zones: PathBuf,

    /// Fine zone polygons (ESRI shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub shapes: Option<PathBuf>,

    /// Polygons of a second, finer zone system to map onto the clusters
    #[arg(long, requires = "shapes", value_hint = clap::ValueHint::FilePath)]
    pub fine_shapes: Option<PathBuf>,

    /// Id attribute of the fine zone polygons
    #[arg(long, default_value = "MGRA")]
    pub fine_id_field: String,

    /// Zone adjacency as `zone,neighbor` pairs (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub adjacency: Option<PathBuf>,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Number of aggregate zones (overrides the config)
    #[arg(short, long)]
    pub n_zones: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct SampleArgs {
    /// Household table (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub households: PathBuf,

    /// Person table (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub persons: PathBuf,

    /// Fine zone to cluster crosswalk (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub crosswalk: PathBuf,

    /// Crosswalk for the households' `taz` column (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub taz_crosswalk: Option<PathBuf>,

    /// Accessibility of the previous iteration (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath, requires = "current")]
    pub previous: Option<PathBuf>,

    /// Accessibility of the current iteration (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath, requires = "previous")]
    pub current: Option<PathBuf>,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct AssembleArgs {
    /// Directory with the archived full-run `indivTripData.csv` and `jointTripData.csv`
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub archived: Option<PathBuf>,

    /// Directory with the resimulated `indivTripData.csv` and `jointTripData.csv`
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub resimulated: PathBuf,

    /// Household table used for the drift report (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub households: Option<PathBuf>,

    /// Crosswalk applied to the archived trips' `*_mgra` columns (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub crosswalk: Option<PathBuf>,

    /// Expand the sample by 1 / RATE instead of reassembling
    #[arg(long, value_name = "RATE")]
    pub rescale_only: Option<f64>,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct TranslateArgs {
    /// Matrices in long format: `origin,destination,<core>...` (CSV)
    #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
    pub matrices: Vec<PathBuf>,

    /// Fine zone to cluster crosswalk (CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub crosswalk: PathBuf,

    /// Name of the zone system the matrices are keyed by
    #[arg(long, default_value = "zone_number")]
    pub mapping: String,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}
