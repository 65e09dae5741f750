use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use clap::ValueHint;
pub use clap_complete::Shell;

use crate::adapters::presenter::OutputFormat;
use crate::domain::PropertyKind;

const AFTER_HELP: &str =
    "Use --help for full details. Use --format json for machine-readable output.";

const LONG_ABOUT: &str = "\
Host interactive command sessions for an editor front-end.\n\
\n\
`termhost host` speaks JSON lines over stdio; the other subcommands run\n\
one-shot jobs against a temporary session.";

const AFTER_LONG_HELP: &str = r#"EXAMPLES:
    # Serve the host protocol to an editor
    termhost host

    # Run a command the way a session would
    termhost run -- cargo build --release

    # Compile the current file through its property file
    termhost sequence src/main.c --kind compile --property-dir ~/.termhost

    # Path completion relative to a directory
    termhost complete src/ma --cwd ./project

    # Static file server with request log
    termhost serve --root ./site --port 8080"#;

#[derive(Parser)]
#[command(name = "termhost")]
#[command(author, version, propagate_version = true)]
#[command(about = "Terminal session and process host for editor front-ends")]
#[command(long_about = LONG_ABOUT)]
#[command(after_help = AFTER_HELP)]
#[command(after_long_help = AFTER_LONG_HELP)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(
        short,
        long,
        global = true,
        value_enum,
        value_name = "FORMAT",
        default_value_t = OutputFormat::Text,
        help_heading = "Output Options"
    )]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true, help_heading = "Output Options")]
    pub json: bool,

    /// Disable colored output (also respects NO_COLOR)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::BoolishValueParser::new(),
        help_heading = "Output Options"
    )]
    pub no_color: bool,

    /// Log at debug level
    #[arg(short, long, global = true, help_heading = "Debug Options")]
    pub verbose: bool,
}

impl Cli {
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the JSON-lines host protocol on stdin/stdout
    Host,

    /// Run one command line and exit with its exit code
    #[command(trailing_var_arg = true)]
    Run {
        /// Working directory (defaults to the current directory)
        #[arg(long, value_hint = ValueHint::DirPath)]
        cwd: Option<PathBuf>,

        /// Command line to run
        #[arg(required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run the property-file command sequence for a target file
    Sequence {
        /// File the sequence operates on
        #[arg(value_hint = ValueHint::FilePath)]
        target: PathBuf,

        /// Property file to use instead of looking one up
        #[arg(long, value_hint = ValueHint::FilePath)]
        property_file: Option<PathBuf>,

        /// Which property file to look up (`<ext>.htpc` or `<ext>.htpr`)
        #[arg(long, value_enum, default_value_t = KindArg::Run)]
        kind: KindArg,

        /// Directory holding property files
        #[arg(long, env = "TERMHOST_PROPERTY_DIR", value_hint = ValueHint::DirPath)]
        property_dir: Option<PathBuf>,
    },

    /// List path completions for a partial word
    Complete {
        /// Partially typed path
        partial: String,

        /// Directory to complete relative to
        #[arg(long, value_hint = ValueHint::DirPath)]
        cwd: Option<PathBuf>,
    },

    /// Serve a directory over HTTP until interrupted
    Serve {
        /// Directory to serve
        #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
        root: PathBuf,

        /// Port to bind (defaults to TERMHOST_SERVER_PORT or 8080)
        #[arg(long)]
        port: Option<u16>,

        /// File served for directory requests
        #[arg(long)]
        default_file: Option<String>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Compile,
    Run,
}

impl From<KindArg> for PropertyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Compile => PropertyKind::Compile,
            KindArg::Run => PropertyKind::Run,
        }
    }
}
