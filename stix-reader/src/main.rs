use anyhow::Context;

fn main() -> anyhow::Result<()> {
  let args: Vec<String> = std::env::args().skip(1).collect();
  stix_reader::run(&args).context("stix-reader")
}
