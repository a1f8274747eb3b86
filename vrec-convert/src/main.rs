use clap::Parser;
use log::info;

use vrec_convert::{convert_file, Cli};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let summary = convert_file(&args.input, &args.output)?;
    info!(
        "Wrote {} ({} frames, {}x{}, {} ms of capture)",
        args.output.display(),
        summary.frames,
        summary.width,
        summary.height,
        summary.duration_ms
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
