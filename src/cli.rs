use clap::{Arg, Command};

pub fn build_cli() -> Command {
    Command::new("lilt")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("expression")
                .short('e')
                .num_args(1)
                .help("Evaluate an expression and print its value"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .num_args(1)
                .help("Run a script file"),
        )
}

pub fn usage() -> &'static str {
    "usage: lilt [-e <expression> | -f <file>]"
}
