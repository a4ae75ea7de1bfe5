use std::path::Path;

use anyhow::Context;
use clap::{App, AppSettings, Arg, SubCommand};

use quillpress::build::{build_site, check_site};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let config_arg = Arg::with_name("config")
        .long("config")
        .short("c")
        .takes_value(true)
        .default_value("site.json")
        .help("Path to the site configuration file");
    let threads_arg = Arg::with_name("threads")
        .long("threads")
        .short("j")
        .takes_value(true)
        .help("Number of loader threads (defaults to the CPU count)");

    let matches = App::new("quillpress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static site from Markdown content")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site into the output directory")
                .arg(config_arg.clone())
                .arg(threads_arg.clone())
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .default_value("public")
                        .help("Directory the rendered site is written to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Validates configuration and content without writing")
                .arg(config_arg)
                .arg(threads_arg),
        )
        .get_matches();

    match matches.subcommand() {
        ("build", Some(matches)) => {
            let config = Path::new(matches.value_of("config").unwrap());
            let output = Path::new(matches.value_of("output").unwrap());
            build_site(config, output, threads(matches)?)
                .context("build failed")?;
        }
        ("check", Some(matches)) => {
            let config = Path::new(matches.value_of("config").unwrap());
            check_site(config, threads(matches)?)
                .context("check failed")?;
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}

fn threads(matches: &clap::ArgMatches) -> anyhow::Result<usize> {
    match matches.value_of("threads") {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid thread count `{}`", value)),
        None => Ok(num_cpus::get()),
    }
}
