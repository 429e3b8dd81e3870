use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;
use rsm::{
    assembler::{AssemblyMode, TripTables},
    common::require_files,
    io::csv::{read_csv, write_csv},
    reassemble, rescale_only, Crosswalk,
};

use super::{load_config, output_path};

const INDIVIDUAL_TRIPS: &str = "indivTripData.csv";
const JOINT_TRIPS: &str = "jointTripData.csv";

fn read_trips(dir: &Path) -> Result<TripTables> {
    let (individual, joint) = (dir.join(INDIVIDUAL_TRIPS), dir.join(JOINT_TRIPS));
    Ok(TripTables {
        individual: read_csv(&individual).with_context(|| format!("reading {}", individual.display()))?,
        joint: read_csv(&joint).with_context(|| format!("reading {}", joint.display()))?,
    })
}

/// Every file the run reads, so a bad run fails before any table is loaded.
fn input_files(args: &crate::cli::AssembleArgs, mode: &AssemblyMode) -> Vec<PathBuf> {
    let mut inputs = vec![args.resimulated.join(INDIVIDUAL_TRIPS), args.resimulated.join(JOINT_TRIPS)];
    if matches!(mode, AssemblyMode::Reassemble) {
        if let Some(archived) = &args.archived {
            inputs.extend([archived.join(INDIVIDUAL_TRIPS), archived.join(JOINT_TRIPS)]);
        }
        inputs.extend(args.households.clone());
        inputs.extend(args.crosswalk.clone());
    }
    inputs
}

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::AssembleArgs) -> Result<()> {
    let config = load_config(cli)?;
    let out_dir = &args.output.clone().unwrap_or(".".into());

    let mode = match args.rescale_only {
        Some(sample_rate) => AssemblyMode::RescaleOnly { sample_rate },
        None => config.assembler,
    };

    require_files(&input_files(args, &mode))?;
    let individual_path = output_path(cli, out_dir, INDIVIDUAL_TRIPS)?;
    let joint_path = output_path(cli, out_dir, JOINT_TRIPS)?;
    let resimulated = read_trips(&args.resimulated)?;

    let mut tables = match mode {
        AssemblyMode::RescaleOnly { sample_rate } => rescale_only(&resimulated, sample_rate)?,
        AssemblyMode::Reassemble => {
            let (Some(archived_dir), Some(households_path)) = (&args.archived, &args.households) else {
                bail!("reassembly needs --archived and --households");
            };
            let drift_path = output_path(cli, out_dir, "trip_drift.csv")?;
            let archived = read_trips(archived_dir)?;
            let households = read_csv(households_path)
                .with_context(|| format!("reading {}", households_path.display()))?;
            let crosswalk = args.crosswalk.as_deref().map(Crosswalk::read_csv).transpose()?;

            let result = reassemble(&archived, &resimulated, &households, crosswalk.as_ref())?;
            info!("[assemble] writing drift report to {}", drift_path.display());
            write_csv(&mut result.drift.to_dataframe()?, &drift_path)?;
            result.tables
        }
    };

    info!(
        "[assemble] writing {} individual and {} joint trips to {}",
        tables.individual.height(), tables.joint.height(), out_dir.display()
    );
    write_csv(&mut tables.individual, &individual_path)?;
    write_csv(&mut tables.joint, &joint_path)?;

    Ok(())
}
