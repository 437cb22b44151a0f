mod bench;
mod cli;
mod init;
mod load;
mod verify;

use cli::Command;

fn main() -> anyhow::Result<()> {
    let cli = init::init();

    match cli.command {
        Command::Bench(args) => {
            let summaries = bench::run(&args)?;
            log::info!("Finished {} benchmark runs", summaries.len());
        }
        Command::Verify(args) => {
            let report = verify::run(&args)?;
            let timed_out = report.timed_out();
            if timed_out > 0 {
                anyhow::bail!(
                    "{timed_out} of {} flushes timed out waiting for the replica",
                    report.flushes.len()
                );
            }
            let mismatched = report.mismatched();
            if mismatched > 0 {
                anyhow::bail!("{mismatched} tables differ between primary and replica");
            }
        }
    }

    Ok(())
}
