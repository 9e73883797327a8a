use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use runwright::scaffold;

#[derive(Parser)]
#[command(name = "runwright-new")]
#[command(about = "Create a new runwright service project", long_about = None)]
struct Cli {
    /// Project name: letters, digits and dashes, starting with a letter
    name: String,

    /// Directory to create the project in
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Path of the runwright crate to depend on (defaults to the one this
    /// tool was built from)
    #[arg(long)]
    runwright_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    println!("Creating project {}...", cli.name);
    let runwright_path = cli
        .runwright_path
        .unwrap_or_else(scaffold::default_runwright_path);
    match scaffold::generate(&cli.dir, &cli.name, &runwright_path) {
        Ok(root) => {
            println!("Created {}", root.display());
            println!("Done! Happy coding!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
