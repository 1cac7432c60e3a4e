use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::load_build_config;
use zettelsite_core::{
    copy_attachments, ApproveAll, CatalogScanner, DeletionPrompt, IgnoreList, LinkReport,
    Reconciler, SiteGenerator,
};

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source folder containing the zettelkasten")
                .default_value("./zettelkasten"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Destination folder for the generated site")
                .default_value("./site"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./zettelsite.toml"),
        )
        .arg(
            Arg::new("refresh-templates")
                .long("refresh-templates")
                .action(ArgAction::SetTrue)
                .help("Overwrite style.css, header.html and footer.html with generated content"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .action(ArgAction::SetTrue)
                .help("Approve all pending deletions without prompting"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Generate the site from the zettelkasten")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_build_config(args)?;
    let source_dir = Path::new(&config.build.source);
    let output_dir = Path::new(&config.build.output);

    // SCAN - build the catalog
    println!("Scanning: {}", source_dir.display());
    let scanner = CatalogScanner::new(source_dir, &config.site.publish_tag);
    let (catalog, warnings) = scanner.scan()?;

    for warning in &warnings {
        println!("  Skipped: {}", warning);
    }
    println!(
        "Discovered {} notes, {} published",
        catalog.len(),
        catalog.published().count()
    );

    // GENERATE - resolve links and synthesize the indexes
    let generator = SiteGenerator::new(&catalog, &config.site);
    let (files, report) = generator.generate();

    // RECONCILE - apply the overwrite/delete/preserve policy
    let ignore = IgnoreList::load(output_dir);
    let reconciler = Reconciler::new(output_dir, &config.site.pages_dir)
        .refresh_templates(config.build.refresh_templates);
    let plan = reconciler.plan(&files, &ignore)?;

    let summary = if config.build.assume_yes {
        reconciler.apply(plan, &mut ApproveAll)?
    } else {
        reconciler.apply(plan, &mut InteractivePrompt)?
    };

    let (copied, attachment_warnings) =
        copy_attachments(&catalog, source_dir, output_dir, &config.site.pages_dir);
    for warning in &attachment_warnings {
        println!("  {}", warning);
    }

    print_link_report(&report);
    println!(
        "{} written, {} deleted, {} preserved, {} attachments copied",
        summary.written, summary.deleted, summary.preserved, copied
    );

    Ok(())
}

fn print_link_report(report: &LinkReport) {
    if report.is_empty() {
        println!("No broken links or stale titles.");
        return;
    }

    println!(
        "Link problems: {} broken, {} stale",
        report.broken_count(),
        report.stale_count()
    );
    for entry in report.entries() {
        let name = if entry.note_title.is_empty() {
            &entry.note_id
        } else {
            &entry.note_title
        };
        println!("  {} ({})", name, entry.note_id);
        for diagnostic in &entry.diagnostics {
            println!("    - {}", diagnostic);
        }
    }
}

/// Asks yes/no per candidate on the terminal. Anything that is not an
/// explicit yes preserves the file.
struct InteractivePrompt;

impl DeletionPrompt for InteractivePrompt {
    fn confirm(&mut self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        let mut approved = Vec::new();
        if candidates.is_empty() {
            return approved;
        }

        println!(
            "{} destination files have no generated counterpart:",
            candidates.len()
        );
        for path in candidates {
            print!("Delete {}? [y/N] ", path.display());
            let _ = std::io::stdout().flush();

            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_err() {
                continue;
            }
            if answer.trim().eq_ignore_ascii_case("y") {
                approved.push(path.clone());
            }
        }

        approved
    }
}
