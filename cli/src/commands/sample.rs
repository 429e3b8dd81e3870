use anyhow::{Context, Result};
use log::{debug, info};
use rsm::{
    common::require_files,
    io::csv::{read_csv, write_csv},
    sample_households,
    sampler::{AccessibilitySnapshot, SampleInputs},
    Crosswalk,
};

use super::{load_config, output_path};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::SampleArgs) -> Result<()> {
    let config = load_config(cli)?;
    let out_dir = &args.output.clone().unwrap_or(".".into());

    let mut inputs = vec![args.households.clone(), args.persons.clone(), args.crosswalk.clone()];
    inputs.extend(args.taz_crosswalk.clone());
    inputs.extend(args.previous.clone());
    inputs.extend(args.current.clone());
    require_files(&inputs)?;

    let households_path = output_path(cli, out_dir, "sampled_households.csv")?;
    let persons_path = output_path(cli, out_dir, "sampled_person.csv")?;

    let households = read_csv(&args.households).with_context(|| format!("reading {}", args.households.display()))?;
    let persons = read_csv(&args.persons).with_context(|| format!("reading {}", args.persons.display()))?;
    let crosswalk = Crosswalk::read_csv(&args.crosswalk)?;
    let taz_crosswalk = args.taz_crosswalk.as_deref().map(Crosswalk::read_csv).transpose()?;
    let previous = args.previous.as_deref().map(AccessibilitySnapshot::read_csv).transpose()?;
    let current = args.current.as_deref().map(AccessibilitySnapshot::read_csv).transpose()?;

    let inputs = SampleInputs {
        households: &households,
        persons: &persons,
        crosswalk: &crosswalk,
        taz_crosswalk: taz_crosswalk.as_ref(),
        previous: previous.as_ref(),
        current: current.as_ref(),
    };
    let mut result = sample_households(&inputs, &config.sampler)?;

    for rate in &result.rates {
        debug!("cluster {}: {} households at rate {:.3} ({:?})", rate.cluster, rate.households, rate.rate, rate.source);
    }

    info!("[sample] writing {} households to {}", result.households.height(), households_path.display());
    write_csv(&mut result.households, &households_path)?;
    write_csv(&mut result.persons, &persons_path)?;

    Ok(())
}
