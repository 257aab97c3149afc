// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, crate_version};

pub fn build_cli() -> Command {
    Command::new("exdate")
        .version(crate_version!())
        .about("Dividend/split detection and ledger reconciliation with cached market data")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("tx")
                .about("Record and list ledger transactions")
                .subcommand(trade_command("buy", "Record a buy (pairs a CashIn row)"))
                .subcommand(trade_command("sell", "Record a sell"))
                .subcommand(
                    Command::new("cash-in")
                        .about("Record a cash deposit")
                        .arg(arg!(--date <DATE> "YYYY-MM-DD").required(true))
                        .arg(arg!(--amount <AMOUNT>).required(true)),
                )
                .subcommand(
                    Command::new("list")
                        .about("List ledger entries, newest first")
                        .arg(arg!(--symbol <SYMBOL>).required(false))
                        .arg(arg!(--exchange <EXCHANGE>).required(false))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_name("TYPE")
                                .help("Buy|Sell|CashIn|Div|Split"),
                        )
                        .arg(
                            arg!(--limit <N>)
                                .required(false)
                                .value_parser(clap::value_parser!(usize)),
                        )
                        .arg(json_flag())
                        .arg(jsonl_flag()),
                ),
        )
        .subcommand(
            Command::new("quote")
                .about("Market data views")
                .subcommand(
                    Command::new("snapshot")
                        .about("Quote fundamentals for a security")
                        .arg(Arg::new("symbol").required(true))
                        .arg(Arg::new("exchange").required(true)),
                )
                .subcommand(
                    Command::new("actions")
                        .about("Corporate-action record for a security")
                        .arg(Arg::new("symbol").required(true))
                        .arg(Arg::new("exchange").required(true)),
                )
                .subcommand(
                    Command::new("prices")
                        .about("One year of daily closing prices")
                        .arg(Arg::new("symbol").required(true))
                        .arg(Arg::new("exchange").required(true))
                        .arg(json_flag())
                        .arg(jsonl_flag()),
                ),
        )
        .subcommand(
            Command::new("actions")
                .about("Daily dividend/split reconciliation")
                .subcommand(
                    Command::new("check")
                        .about("Run the daily check over all tracked securities"),
                )
                .subcommand(
                    Command::new("reset").about("Clear the per-day checked-set"),
                )
                .subcommand(
                    Command::new("status").about("Per-security check state for today"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("ledger")
                        .about("Export the ledger")
                        .arg(arg!(--format <FORMAT> "csv|json").required(true))
                        .arg(arg!(--out <FILE>).required(true)),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Cache backing-store hygiene")
                .subcommand(Command::new("stats").about("Entry counts"))
                .subcommand(Command::new("purge").about("Delete expired entries")),
        )
        .subcommand(Command::new("doctor").about("Consistency checks"))
}

fn trade_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(arg!(--date <DATE> "YYYY-MM-DD").required(true))
        .arg(arg!(--symbol <SYMBOL>).required(true))
        .arg(arg!(--exchange <EXCHANGE>).required(true))
        .arg(arg!(--units <UNITS>).required(true))
        .arg(arg!(--price <PRICE> "Price per unit").required(true))
        .arg(arg!(--fees <FEES>).required(false))
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print as pretty JSON")
}

fn jsonl_flag() -> Arg {
    Arg::new("jsonl")
        .long("jsonl")
        .action(ArgAction::SetTrue)
        .help("Print as JSON lines")
}
