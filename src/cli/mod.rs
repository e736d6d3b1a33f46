pub mod config;

use clap::{Arg, ArgMatches, Command};

pub fn build_command() -> Command {
    Command::new("simkit")
        .about("Terminal client for a contest-judging server")
        .arg(
            Arg::new("server")
                .long("server")
                .short('s')
                .help("Base URL of the server, e.g. https://judge.example.org")
                .value_name("URL"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file (TOML)")
                .value_name("PATH")
                .default_value(config::DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("cookie")
                .long("cookie")
                .help("Cookie header sent with every request, including the session and csrf_token cookies")
                .value_name("COOKIES"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .help("Request timeout in milliseconds")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("location")
                .long("location")
                .short('l')
                .help("Location to open, e.g. /users or /logs#Job%20server")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("no-session-cache")
                .long("no-session-cache")
                .help("Do not load or save the navigation history")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}
