use std::fs;
use std::process::exit;

use lilt::cli::{build_cli, usage};
use lilt::vm::VM;

/// Fatal errors terminate with a nonzero exit and a single line on
/// stderr; anything that is not a valid invocation just prints usage.
fn main() {
    env_logger::init();

    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(_) => {
            println!("{}", usage());
            return;
        }
    };

    let source = if let Some(expression) = matches.get_one::<String>("expression") {
        expression.clone()
    } else if let Some(path) = matches.get_one::<String>("file") {
        match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("Fatal error: could not read {path}: {err}");
                exit(1);
            }
        }
    } else {
        println!("{}", usage());
        return;
    };

    let mut vm = VM::new();
    vm.install_sigint_handler();
    match vm.exec(&source) {
        Ok(value) => println!("{}", vm.format_value(&value)),
        Err(err) => {
            eprintln!("Fatal error: {err}");
            exit(1);
        }
    }
}
