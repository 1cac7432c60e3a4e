use clap::Command;

mod cmd;
mod config;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("zettelsite")
        .about("Publish a zettelkasten as a static website")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .get_matches();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        _ => unreachable!(),
    }
}
