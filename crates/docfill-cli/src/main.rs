//! docfill CLI - fill DOCX contract templates from the command line.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docfill_backend::{
    autofill_placeholders, discover, fill_template, open_requisite_source, DocxPackage,
    RequisiteSource,
};
use docfill_core::{Placeholder, RenderOptions};

#[derive(Parser, Debug)]
#[command(
    name = "docfill",
    about = "Fill #placeholder tokens in DOCX templates",
    long_about = "Fill #placeholder tokens in DOCX templates.\n\
                  \n\
                  A placeholder is '#' followed by letters or digits, e.g. #имя or #инн.\n\
                  Values come from a JSON file or are matched automatically from a\n\
                  counterparty details document (DOCX or PDF).",
    version
)]
struct Args {
    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the placeholders found in a template
    Placeholders {
        /// Template file path
        #[arg(value_name = "TEMPLATE")]
        input: PathBuf,

        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the requisite lines extracted from a details document
    Requisites {
        /// Details document (DOCX or PDF)
        #[arg(value_name = "DETAILS")]
        input: PathBuf,

        /// Print as JSON instead of a numbered list
        #[arg(long)]
        json: bool,
    },

    /// Fill a template with values from a JSON file
    ///
    /// Only tokens named in the JSON file are substituted; any other token
    /// stays in the document unchanged.
    Fill {
        /// Template file path
        #[arg(value_name = "TEMPLATE")]
        input: PathBuf,

        /// JSON file mapping placeholder names to values
        #[arg(short = 'V', long, value_name = "JSON")]
        values: PathBuf,

        /// Output file path (default: <template>_filled_<timestamp>.docx)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Font family to apply to substituted runs without preserved properties
        #[arg(long, value_name = "FAMILY")]
        font: Option<String>,

        /// Font size in points for substituted runs without preserved properties
        #[arg(long, value_name = "POINTS")]
        font_size: Option<u32>,

        /// Also convert the filled document to PDF
        #[arg(long)]
        pdf: bool,

        /// Conversion service endpoint (default: the hosted converter)
        #[arg(long, value_name = "URL", requires = "pdf")]
        pdf_url: Option<String>,
    },

    /// Fill a template with values matched from a details document
    Autofill {
        /// Template file path
        #[arg(value_name = "TEMPLATE")]
        input: PathBuf,

        /// Counterparty details document (DOCX or PDF)
        #[arg(short, long, value_name = "DETAILS")]
        details: PathBuf,

        /// Output file path (default: <template>_filled_<timestamp>.docx)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Font family to apply to substituted runs without preserved properties
        #[arg(long, value_name = "FAMILY")]
        font: Option<String>,

        /// Font size in points for substituted runs without preserved properties
        #[arg(long, value_name = "POINTS")]
        font_size: Option<u32>,

        /// Also convert the filled document to PDF
        #[arg(long)]
        pdf: bool,

        /// Conversion service endpoint (default: the hosted converter)
        #[arg(long, value_name = "URL", requires = "pdf")]
        pdf_url: Option<String>,

        /// Print matched values without writing any file
        #[arg(long, conflicts_with_all = ["output", "pdf"])]
        dry_run: bool,
    },
}

fn init_logging(quiet: bool, verbose: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn render_options(
    font: Option<String>,
    font_size: Option<u32>,
    pdf: bool,
    pdf_url: Option<String>,
) -> RenderOptions {
    let mut options = RenderOptions::preserve().with_pdf(pdf);
    if let Some(family) = font {
        options = options.with_font(family);
    }
    if let Some(points) = font_size {
        options = options.with_font_size(points);
    }
    if let Some(url) = pdf_url {
        options = options.with_pdf_url(url);
    }
    options
}

fn load_values(path: &Path) -> Result<Vec<Placeholder>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("cannot read values file {}", path.display()))?;
    // BTreeMap keeps the listing deterministic.
    let values: BTreeMap<String, String> = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON object of strings", path.display()))?;
    Ok(values
        .into_iter()
        .map(|(name, value)| Placeholder::new(name, value))
        .collect())
}

fn write_outputs(
    filled: docfill_backend::FilledDocument,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let docx_path = output.unwrap_or_else(|| PathBuf::from(&filled.file_name));
    fs::write(&docx_path, &filled.docx)
        .with_context(|| format!("cannot write {}", docx_path.display()))?;
    if !quiet {
        println!("{} {}", "Written:".green().bold(), docx_path.display());
    }

    if let Some(pdf) = filled.pdf {
        let pdf_path = docx_path.with_extension("pdf");
        fs::write(&pdf_path, pdf)
            .with_context(|| format!("cannot write {}", pdf_path.display()))?;
        if !quiet {
            println!("{} {}", "Written:".green().bold(), pdf_path.display());
        }
    }
    Ok(())
}

fn print_placeholders(placeholders: &[Placeholder], with_values: bool) {
    for placeholder in placeholders {
        let name = format!("#{}", placeholder.name);
        if with_values {
            if placeholder.value.is_empty() {
                println!("  {}  {}", name.cyan(), "(not matched)".yellow());
            } else {
                println!("  {}  {}", name.cyan(), placeholder.value);
            }
        } else {
            println!("  {}", name.cyan());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);

    match args.command {
        Commands::Placeholders { input, json } => {
            let package = DocxPackage::open(&input)
                .with_context(|| format!("cannot open template {}", input.display()))?;
            let placeholders = discover(&package)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&placeholders)?);
            } else if placeholders.is_empty() {
                println!("{}", "No placeholders found.".yellow());
            } else {
                println!(
                    "{} placeholder(s) in {}:",
                    placeholders.len(),
                    input.display()
                );
                print_placeholders(&placeholders, false);
            }
        }

        Commands::Requisites { input, json } => {
            let source = open_requisite_source(&input)
                .with_context(|| format!("cannot open details document {}", input.display()))?;
            let lines = source.requisite_lines()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else if lines.is_empty() {
                println!("{}", "No requisite lines found.".yellow());
            } else {
                for line in &lines {
                    println!("{:>4}  {}", line.id, line.value);
                }
            }
        }

        Commands::Fill {
            input,
            values,
            output,
            font,
            font_size,
            pdf,
            pdf_url,
        } => {
            let package = DocxPackage::open(&input)
                .with_context(|| format!("cannot open template {}", input.display()))?;
            let placeholders = load_values(&values)?;
            let options = render_options(font, font_size, pdf, pdf_url);
            let filled = fill_template(&package, &placeholders, &options)?;
            write_outputs(filled, output, args.quiet)?;
        }

        Commands::Autofill {
            input,
            details,
            output,
            font,
            font_size,
            pdf,
            pdf_url,
            dry_run,
        } => {
            let package = DocxPackage::open(&input)
                .with_context(|| format!("cannot open template {}", input.display()))?;
            let source = open_requisite_source(&details)
                .with_context(|| format!("cannot open details document {}", details.display()))?;
            let placeholders = autofill_placeholders(&package, source.as_ref())?;

            if dry_run {
                println!("Matched values for {}:", input.display());
                print_placeholders(&placeholders, true);
                return Ok(());
            }

            let unmatched: Vec<&Placeholder> =
                placeholders.iter().filter(|p| p.value.is_empty()).collect();
            if !unmatched.is_empty() && !args.quiet {
                eprintln!(
                    "{} {} placeholder(s) not matched: {}",
                    "Warning:".yellow().bold(),
                    unmatched.len(),
                    unmatched
                        .iter()
                        .map(|p| format!("#{}", p.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }

            let options = render_options(font, font_size, pdf, pdf_url);
            let filled = fill_template(&package, &placeholders, &options)?;
            write_outputs(filled, output, args.quiet)?;
        }
    }
    Ok(())
}
