use recordpipe_pipeline::{produce_over_stream, RecordClient};

use crate::cmd::SendArgs;
use crate::exit::{pipeline_error, CliResult, SUCCESS};
use crate::output::{print_send_summary, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let pacing = args.generation.pacing()?;
    let mut source = args.generation.source();

    let mut client = RecordClient::connect((args.host.as_str(), args.port))
        .map_err(|err| pipeline_error("connect failed", err))?;
    let peer = client.peer_addr().map(|addr| addr.to_string());

    produce_over_stream(&mut client, &mut source, &args.prefix, args.count, &pacing)
        .map_err(|err| pipeline_error("send failed", err))?;
    let sent = client
        .finish()
        .map_err(|err| pipeline_error("send failed", err))?;

    print_send_summary(sent, peer, format);
    Ok(SUCCESS)
}
