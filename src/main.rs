use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};

use exprc::ast::stringify::print_tree;
use exprc::compiler::compile;
use exprc::ir::stringify::stringify;
use exprc::lower::Assembler;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_SOURCE: &str = "let result = my_func(10.5, 20.5);";
const DEFAULT_OUTPUT: &str = "output.s";

const HELP: &str = "\
exprc - compile expressions to x86-64 NASM assembly

USAGE:
    exprc [OPTIONS] [FILE]

    Without FILE or --eval the built-in program
    `let result = my_func(10.5, 20.5);` is compiled.

OPTIONS:
    -e, --eval <SOURCE>    Compile SOURCE instead of a file
    -o, --output <PATH>    Write the listing to PATH [default: output.s]
        --emit-ast         Print the annotated syntax tree
        --emit-ir          Print the three-address code
    -h, --help             Show this help
    -V, --version          Show version

Set RUST_LOG=debug for a trace of every stage.
";

enum Input {
    File(PathBuf),
    Inline(String),
    Default,
}

struct Options {
    input: Input,
    output: PathBuf,
    emit_ast: bool,
    emit_ir: bool,
}

enum Command {
    Compile(Options),
    Help,
    Version,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut opts = Options {
        input: Input::Default,
        output: PathBuf::from(DEFAULT_OUTPUT),
        emit_ast: false,
        emit_ir: false,
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            "--emit-ast" => opts.emit_ast = true,
            "--emit-ir" => opts.emit_ir = true,
            "-e" | "--eval" => {
                let source = args.next().with_context(|| format!("{} needs a value", arg))?;
                set_input(&mut opts, Input::Inline(source))?;
            }
            "-o" | "--output" => {
                let path = args.next().with_context(|| format!("{} needs a value", arg))?;
                opts.output = PathBuf::from(path);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                bail!("unknown option {} (see --help)", flag)
            }
            file => set_input(&mut opts, Input::File(PathBuf::from(file)))?,
        }
    }
    return Ok(Command::Compile(opts));
}

fn set_input(opts: &mut Options, input: Input) -> Result<()> {
    if !matches!(opts.input, Input::Default) {
        bail!("only one source can be given");
    }
    opts.input = input;
    Ok(())
}

fn run(opts: Options) -> Result<()> {
    let source = match &opts.input {
        Input::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?,
        Input::Inline(source) => source.clone(),
        Input::Default => DEFAULT_SOURCE.to_string(),
    };

    let compilation = compile(&source)?;
    for warning in &compilation.warnings {
        eprintln!("{}", warning);
    }
    if opts.emit_ast {
        print!("{}", print_tree(&compilation.ast));
    }
    if opts.emit_ir {
        print!("{}", stringify(&compilation.ir));
    }

    let assembled = Assembler::create(&opts.output)?.assemble(&compilation.ir);
    if let Err(err) = assembled {
        // nothing was written, don't leave an empty listing behind
        let _ = std::fs::remove_file(&opts.output);
        return Err(err);
    }
    log::info!("wrote {}", opts.output.display());
    Ok(())
}

fn main() {
    env_logger::init();

    let command = match parse_args(env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(1);
        }
    };
    let opts = match command {
        Command::Help => {
            print!("{}", HELP);
            return;
        }
        Command::Version => {
            println!("exprc {}", VERSION);
            return;
        }
        Command::Compile(opts) => opts,
    };
    if let Err(err) = run(opts) {
        eprintln!("error: {:#}", err);
        process::exit(1);
    }
}
