use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table.
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        if options.no_color {
            colored::control::set_override(false);
        }
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => println!("{}", data.to_table(self)),
        }
        Ok(())
    }

    pub fn success(&self, message: &str) {
        self.line(ICONS.success, message, THEME.success);
    }

    pub fn warning(&self, message: &str) {
        self.line(ICONS.warning, message, THEME.warning);
    }

    pub fn info(&self, message: &str) {
        self.line(ICONS.info, message, THEME.info);
    }

    /// Only shown with `--verbose`.
    pub fn verbose(&self, message: &str) {
        if self.options.verbose {
            self.line(ICONS.arrow, message, THEME.muted);
        }
    }

    pub fn heading(&self, text: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.len()));
        } else {
            println!("\n{}", text.color(THEME.primary).bold());
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        if self.options.no_color {
            println!("  {key}: {value}");
        } else {
            println!("  {}: {}", key.color(THEME.key).bold(), value.color(THEME.value));
        }
    }

    fn line(&self, icon: &str, message: &str, color: Color) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        if self.options.no_color {
            println!("{icon} {message}");
        } else {
            println!("{} {}", icon.color(color), message.color(color));
        }
    }

    /// Create a themed table with a bold header row
    pub fn create_table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }

        let header_cells: Vec<Cell> = headers
            .iter()
            .map(|header| {
                let cell = Cell::new(header).add_attribute(Attribute::Bold);
                if self.options.no_color {
                    cell
                } else {
                    cell.fg(TableColor::Cyan)
                }
            })
            .collect();
        table.set_header(header_cells);
        table
    }
}
