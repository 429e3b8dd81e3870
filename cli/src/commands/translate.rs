use anyhow::{anyhow, Context, Result};
use log::info;
use rsm::{common::require_files, Crosswalk, ZoneMatrix};

use super::{load_config, output_path};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::TranslateArgs) -> Result<()> {
    load_config(cli)?;
    let out_dir = &args.output.clone().unwrap_or(".".into());

    let mut inputs = args.matrices.clone();
    inputs.push(args.crosswalk.clone());
    require_files(&inputs)?;

    let crosswalk = Crosswalk::read_csv(&args.crosswalk)?;
    for path in &args.matrices {
        let name = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("matrix path {} has no file name", path.display()))?;
        let out_path = output_path(cli, out_dir, name)?;

        info!("[translate] aggregating {}", path.display());
        let matrix = ZoneMatrix::read_csv(path, &args.mapping)
            .with_context(|| format!("reading {}", path.display()))?;
        matrix.aggregate(&crosswalk)
            .with_context(|| format!("aggregating {}", path.display()))?
            .write_csv(&out_path)?;
    }

    Ok(())
}
