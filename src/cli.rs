//! Command line interface for wisp

use crate::{compiler::emit, core::{Config, Error}, parser::parse};

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::Command,
};

#[derive(Copy, Clone)]
pub enum Action {
    /// Print the parse tree and stop
    Parse,
    /// Write the generated assembly
    GenAsm,
    /// Assemble, link and execute
    Run,
}

pub fn run<'a>(config: &'a Config, action: Action) -> Result<Option<String>, Error<'a>> {
    let prog = parse(&config.program)?;

    match action {
        Action::Parse => {
            for e in &prog {
                println!("{:?}", e);
            }
            Ok(None)
        }
        Action::GenAsm => {
            let asm = emit::program(&prog)?;
            write(config, &asm)?;
            Ok(None)
        }
        Action::Run => {
            let asm = emit::program(&prog)?;
            let output = config.output.clone().unwrap_or_else(|| String::from("a.wisp"));

            fs::write(asm_file(&output), asm).map_err(|e| Error::Internal {
                message: format!("Failed to write {}", asm_file(&output)),
                e: Some(e),
            })?;

            build(&output)?;
            exec(&output)
        }
    }
}

fn asm_file(output: &str) -> String {
    format!("{}.s", output)
}

fn write(config: &Config, asm: &str) -> Result<(), Error<'static>> {
    match &config.output {
        Some(f) => fs::write(f, asm).map_err(|e| Error::Internal {
            message: format!("Failed to write {}", f),
            e: Some(e),
        }),
        None => io::stdout().write_all(asm.as_bytes()).map_err(Error::from),
    }
}

/// Assemble and link the generated program.
///
/// The output is freestanding: `-nostdlib` keeps the C runtime out (the
/// weak `main` alias is there for anyone who wants it back) and `-m32`
/// selects the target.
pub fn build(output: &str) -> Result<(), Error<'static>> {
    let exe = Command::new("gcc")
        .arg("-m32")
        .arg("-nostdlib")
        .arg(asm_file(output))
        .arg("-o")
        .arg(output)
        .output()
        .map_err(|e| Error::Internal {
            message: String::from("Failed to execute the assembler"),
            e: Some(e),
        })?;

    if exe.status.success() {
        Ok(())
    } else {
        Err(Error::Internal {
            message: format!(
                "Failed to assemble generated code. \n{}",
                String::from_utf8_lossy(&exe.stderr)
            ),
            e: None,
        })
    }
}

/// Run the generated binary and return its output
pub fn exec(output: &str) -> Result<Option<String>, Error<'static>> {
    let path = PathBuf::from(output).canonicalize()?;
    let exe = Command::new(&path).output()?;

    Ok(Some(String::from_utf8_lossy(&exe.stdout).to_string()))
}
