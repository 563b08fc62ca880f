use std::io::Read;

use clap::Parser;
use ember_vm::{ext, Value, Vm, VmOptions};

#[derive(Debug, Parser)]
#[command(name = "ember", version, about = "Run ember scripts")]
struct Args {
    /// Script to run. Reads stdin when neither a path nor --eval is given.
    path: Option<String>,

    /// Evaluate an expression instead of a file
    #[arg(short, long, value_name = "EXPR")]
    eval: Option<String>,

    /// Maximum call depth
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Skip registering the filesystem and regexp modules
    #[arg(long)]
    no_ext: bool,

    /// Print the compiled top-level bytecode before running
    #[arg(long)]
    dump: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut opts = VmOptions::default();
    if let Some(depth) = args.max_depth {
        opts.max_frames = depth;
    }
    let mut vm = Vm::with_options(opts);
    if !args.no_ext {
        ext::import_all(&mut vm);
    }

    match (&args.eval, &args.path) {
        (Some(expr), _) => vm.load_str(expr)?,
        (None, Some(path)) => vm.load_file(path)?,
        (None, None) => {
            let mut src = String::new();
            std::io::stdin().read_to_string(&mut src)?;
            vm.load_str(&src)?;
        }
    }

    if args.dump {
        println!("{}", vm.dump_bytecode());
    }

    let res = vm.run()?;
    if args.eval.is_some() && !matches!(res, Value::Null) {
        println!("{res}");
    }
    Ok(())
}
