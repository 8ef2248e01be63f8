//! `manifest` command-line entry point

use manifest_cli::{command, init_tracing, run};

fn main() -> anyhow::Result<()> {
    let matches = command().get_matches();
    init_tracing(matches.get_flag("json"));

    let output = run(&matches)?;
    println!("{output}");
    Ok(())
}
