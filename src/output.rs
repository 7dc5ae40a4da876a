use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ExtractResult, LoadResult, RunResult};
use crate::sync::Outcome;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_extract(result: &ExtractResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_load(result: &LoadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_extract(result: &ExtractResult) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}extract summary{reset}");
        println!("  listed:   {}", result.listed);
        println!("{green}  fetched:  {}{reset}", result.fetched);
        println!("  skipped:  {}", result.skipped);
        if result.dry_run {
            println!("{yellow}  would fetch: {} (dry run){reset}", result.would_fetch);
        }
        println!("{red}  failed:   {}{reset}", result.failed);
        println!("  records:  {}", result.records);

        for item in &result.items {
            let url = item.url.as_deref().unwrap_or("<no url>");
            match &item.outcome {
                Outcome::Filtered | Outcome::Skipped => {}
                Outcome::WouldFetch => println!("{yellow}  ~ {url}{reset}"),
                Outcome::Fetched { path } => {
                    println!("{green}  + {url}{reset}");
                    println!("      -> {}", path.display());
                }
                Outcome::Failed { reason } => {
                    println!("{red}  ! {url}{reset}");
                    println!("      {reason}");
                }
            }
        }
    }

    pub fn print_load(result: &LoadResult) {
        let green = "\x1b[32m";
        let red = "\x1b[31m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        println!(
            "{cyan}load summary: s3://{}/{}{reset}",
            result.bucket, result.remote_prefix
        );
        println!("{green}  uploaded: {}{reset}", result.report.uploaded.len());
        println!("{red}  failed:   {}{reset}", result.report.failed.len());
        for failed in &result.report.failed {
            println!("{red}  ! {} ({}){reset}", failed.path.display(), failed.reason);
        }
        if result.report.staging_removed {
            println!("  staging directory removed");
        }
    }

    pub fn print_run(result: &RunResult) {
        Self::print_extract(&result.extract);
        Self::print_load(&result.load);
    }
}
