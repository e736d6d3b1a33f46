use anyhow::Result;

fn main() -> Result<()> {
    simkit::boot::init_common();
    let matches = simkit::cli::parse_args();
    if let Err(err) = simkit::boot::start_tui(&matches) {
        log::error!("simkit exited with an error: {err:#}");
        return Err(err);
    }
    Ok(())
}
