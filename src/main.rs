use getopts::Options;
use std::{
    env,
    io::{self, Read},
    process::exit,
};
use wisp::{
    cli::{run, Action::*},
    core::Config,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    let bin = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("o", "", "Output file name", "FILE");
    opts.optflag("p", "", "Print the parse tree");
    opts.optflag("r", "", "Assemble, link and run the program");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            exit(2)
        }
    };

    if matches.opt_present("h") {
        print!("{}", opts.usage(&format!("Usage: {} [options] < program", bin)));
        return;
    }

    let mut program = String::new();
    io::stdin().read_to_string(&mut program).expect("Expected a program in stdin");

    let config = Config { program, output: matches.opt_str("o") };

    let action = if matches.opt_present("p") {
        Parse
    } else if matches.opt_present("r") {
        Run
    } else {
        GenAsm
    };

    match run(&config, action) {
        Err(e) => {
            eprintln!("{}", e);
            exit(1)
        }
        Ok(Some(out)) => print!("{}", out),
        Ok(None) => {}
    }
}
