use recordpipe_pipeline::{run_local, DirectoryStage, LocalConfig};

use crate::cmd::LocalArgs;
use crate::exit::{pipeline_error, staging_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_local_summary, OutputFormat, ReportPrinter};

pub fn run(args: LocalArgs, format: OutputFormat) -> CliResult<i32> {
    if args.capacity == 0 {
        return Err(CliError::new(USAGE, "--capacity must be at least 1"));
    }
    let pacing = args.generation.pacing()?;
    let stage = DirectoryStage::new(&args.stage_dir)
        .map_err(|err| staging_error("staging directory unavailable", err))?;

    let config = LocalConfig {
        count: args.count,
        capacity: args.capacity,
        pacing,
    };
    let mut source = args.generation.source();
    let printer = ReportPrinter::new(format);

    let summary = run_local(&config, &mut source, &stage, &printer)
        .map_err(|err| pipeline_error("local pipeline failed", err))?;

    print_local_summary(&summary, &args.stage_dir.display().to_string(), format);

    if summary.rejected > 0 {
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}
