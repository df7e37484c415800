use clap::Parser;
use station_climate::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(args) => result,
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => eprintln!("\nReceived CTRL+C, shutting down..."),
                    Err(e) => eprintln!("Failed to listen for CTRL+C: {}", e),
                }
                Err(anyhow::anyhow!("Interrupted by user"))
            }
        }
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Station Climate - UK Met Office Historic Station Data Summaries");
    println!("================================================================");
    println!();
    println!("Reads a Met Office historic station data file, skips its free-text");
    println!("preamble and prints monthly climatologies or single month profiles.");
    println!();
    println!("USAGE:");
    println!("    station-climate <COMMAND> <FILE> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    summary     Grouped summary statistics (monthly by default)");
    println!("    profile     Temperature histograms and extremes for one month");
    println!("    inspect     File metadata, header size and the first cleaned rows");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    --delimiter <REGEX>   Cell separator (default: whitespace)");
    println!("    -v, --verbose         Increase logging verbosity");
    println!("    -q, --quiet           Only log errors");
    println!("    -h, --help            Show help information");
    println!("    -V, --version         Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Monthly climatology of minimum, average and maximum temperature:");
    println!("    station-climate summary heathrowdata.txt");
    println!();
    println!("    # Annual rainfall totals:");
    println!("    station-climate summary heathrowdata.txt --group-by year --agg rain_mm=sum");
    println!();
    println!("    # July temperature profile:");
    println!("    station-climate profile heathrowdata.txt --month 7");
}
