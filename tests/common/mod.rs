#![allow(dead_code)]

use assert_cmd::cargo_bin;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::process::Command;

/// A `zenith` invocation isolated in `dir`: no config file, session or log
/// filter leaks in from the developer's environment.
pub fn zenith(dir: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("zenith"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

/// Same as [`zenith`], storing data in `dir/data.json`.
pub fn zenith_with_data(dir: &Path) -> Command {
    let mut cmd = zenith(dir);
    cmd.arg("--data").arg(dir.join("data.json"));
    cmd
}

pub fn add_debt(dir: &Path, description: &str, amount: &str, extra: &[&str]) {
    let output = zenith_with_data(dir)
        .args(["debts", "add", "--description", description])
        .args(["--amount", amount, "--due", "2099-12-31"])
        .args(extra)
        .output()
        .expect("failed to run zenith");
    assert!(
        output.status.success(),
        "debts add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn write_import_csv(path: &Path, rows: &[[&str; 5]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["debt", "amount", "currency", "rate", "note"])?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
