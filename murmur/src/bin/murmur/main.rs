mod commands;
mod output;
mod theme;

use std::io::{self, Write as IoWrite};

use anyhow::Result;
use clap::{
    ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::{Color as ThemeColor, control::ShouldColorize};

use commands::{CleanupArgs, ConfigArgs, handle_cleanup, handle_config, handle_ping, handle_reconcile, handle_user};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::THEME;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(version)]
#[command(
    about = "Operator tool for the murmur social graph store",
    long_about = r#"Operator tool for the murmur social graph store:

• Inspect the effective settings
• Check connectivity and look up users
• Recompute a user's counters and caches from the primary relations
• Remove every key under the configured prefix

Environment:
  REDIS_URL       Redis connection URL when the config uses ${REDIS_URL}
  MURMUR_CONFIG   Path to the TOML settings file
  RUST_LOG        Log filter (e.g. murmur=debug)
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective settings
    Config,

    /// Check that Redis is reachable
    Ping,

    /// Show a user's profile and counters
    User {
        /// Username to look up
        username: String,
    },

    /// Recompute a user's counters and rebuild their caches
    Reconcile {
        /// Id of the user to repair
        user_id: String,
    },

    /// Delete every key under the configured prefix
    Cleanup(CleanupArgs),
}

impl Cli {
    fn parse_with_styles() -> Self {
        let use_color = ShouldColorize::from_env().should_colorize();
        let command = Cli::command()
            .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
            .styles(help_styles());

        let parsed = command
            .try_get_matches()
            .and_then(|matches| Cli::from_arg_matches(&matches));
        match parsed {
            Ok(cli) => cli,
            Err(err) => {
                let exit_code = match err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => err.exit_code(),
                };
                if let Err(print_err) = err.print()
                    && print_err.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Failed to display help: {print_err}");
                }
                std::process::exit(exit_code);
            }
        }
    }
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.key))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();

    match execute(cli).await {
        Ok(()) => {
            let _ = print_blank_line_stdout();
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    let output = OutputManager::new(global_options);

    match cli.command {
        Commands::Config => handle_config(cli.config, &output).await?,
        Commands::Ping => handle_ping(cli.config, &output).await?,
        Commands::User { username } => handle_user(cli.config, username, &output).await?,
        Commands::Reconcile { user_id } => handle_reconcile(cli.config, user_id, &output).await?,
        Commands::Cleanup(args) => handle_cleanup(cli.config, args, &output).await?,
    }

    Ok(())
}
