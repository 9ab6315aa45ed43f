use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use recordpipe_pipeline::{DirectoryStage, RecordServer, RecordSink};

use crate::cmd::ServeArgs;
use crate::exit::{pipeline_error, staging_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{OutputFormat, ReportPrinter};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let budget = match args.count {
        0 => None,
        n => Some(usize::try_from(n).map_err(|_| CliError::new(USAGE, "--count is too large"))?),
    };
    let stage = DirectoryStage::new(&args.stage_dir)
        .map_err(|err| staging_error("staging directory unavailable", err))?;

    let server = RecordServer::bind((args.host.as_str(), args.port))
        .map_err(|err| pipeline_error("bind failed", err))?
        .with_stage(Arc::new(stage))
        .with_record_budget(budget);
    tracing::info!(
        addr = %server.local_addr(),
        budget = ?budget,
        stage_dir = %args.stage_dir.display(),
        "server ready"
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let sink: Arc<dyn RecordSink> = Arc::new(ReportPrinter::new(format));
    server
        .serve(sink, &running)
        .map_err(|err| pipeline_error("server failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
