use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::application::{FriendOverview, SplitService, SplitSpec};
use crate::domain::{format_cents, parse_cents};
use crate::io::Exporter;

/// Splitbook - Expense-Sharing Ledger
#[derive(Parser)]
#[command(name = "splitbook")]
#[command(about = "A local-first expense-sharing ledger that reconciles who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "splitbook.db")]
    pub database: String,

    /// Your name as it appears in bills and settlements
    #[arg(short, long, default_value = "me")]
    pub user: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Friend roster commands
    #[command(subcommand)]
    Friend(FriendCommands),

    /// Record a shared bill
    Bill {
        /// Total amount (e.g., "90.00" or "90")
        amount: String,

        /// Who paid the bill (defaults to you)
        #[arg(long)]
        payer: Option<String>,

        /// Comma-separated participants who owe a portion
        #[arg(long, value_delimiter = ',', required = true)]
        split_with: Vec<String>,

        /// Split type: equal, exact, percentage
        #[arg(long, default_value = "equal")]
        split: String,

        /// Per-participant share for exact/percentage splits, repeatable
        /// (e.g., --share alice=25.50 --share bob=74.50)
        #[arg(long = "share", value_name = "NAME=VALUE")]
        shares: Vec<String>,

        /// Currency code
        #[arg(long)]
        currency: Option<String>,

        /// Description of the expense
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Date of the expense (ISO 8601 format: YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a direct payment between two people
    Settle {
        /// Amount paid (e.g., "20.00")
        amount: String,

        /// Who paid (defaults to you)
        #[arg(long)]
        from: Option<String>,

        /// Who received (defaults to you)
        #[arg(long)]
        to: Option<String>,

        /// Note, typically the payment method
        #[arg(short, long)]
        note: Option<String>,

        /// Date of the payment (ISO 8601 format: YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List the settlement history with one person
    Settlements {
        /// The other party
        person: String,

        /// First party (defaults to you)
        #[arg(long)]
        with: Option<String>,
    },

    /// Show the reconciled balance for a friend, or for all friends
    Balance {
        /// Friend name (omit for all friends; your own name shows what you
        /// owe others and what others owe you)
        friend: Option<String>,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: bills, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum FriendCommands {
    /// Add a friend to the roster
    Add {
        /// Friend name (must match the name used in bills)
        name: String,
    },

    /// List all friends
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if self.verbose {
            eprintln!("Using database {} as {}", self.database, self.user);
        }

        match self.command {
            Commands::Init => {
                SplitService::init(&self.database, self.user.as_str()).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Friend(friend_cmd) => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                run_friend_command(&service, friend_cmd).await?;
            }

            Commands::Bill {
                amount,
                payer,
                split_with,
                split,
                shares,
                currency,
                description,
                date,
            } => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '90.00' or '90'")?;
                let timestamp = parse_timestamp(date)?;
                let spec = parse_split_spec(&split, &shares)?;

                let bill = service
                    .record_bill(
                        payer.as_deref(),
                        amount_cents,
                        split_with,
                        spec,
                        timestamp,
                        currency,
                        description,
                    )
                    .await?;

                println!(
                    "Recorded bill: {} paid by {}, split {} among {} ({})",
                    format_cents(bill.amount_cents),
                    bill.payer,
                    bill.split_type,
                    bill.participants().join(", "),
                    bill.id
                );
            }

            Commands::Settle {
                amount,
                from,
                to,
                note,
                date,
            } => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '20.00' or '20'")?;
                let timestamp = parse_timestamp(date)?;

                let payer = from.unwrap_or_else(|| self.user.clone());
                let receiver = to.unwrap_or_else(|| self.user.clone());
                if payer == receiver {
                    bail!("A settlement needs two different people (use --from or --to)");
                }

                let settlement = service
                    .record_settlement(&payer, &receiver, amount_cents, timestamp, note)
                    .await?;

                println!(
                    "Recorded settlement: {} {} -> {} ({})",
                    format_cents(settlement.amount_cents),
                    settlement.payer,
                    settlement.receiver,
                    settlement.id
                );
            }

            Commands::Settlements { person, with } => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                let first = with.unwrap_or_else(|| self.user.clone());
                let history = service.settlements_between(&first, &person).await?;

                if history.is_empty() {
                    println!("No settlements between {} and {}", first, person);
                } else {
                    println!("Settlements between {} and {}:", first, person);
                    for s in &history {
                        let note = s.note.as_deref().unwrap_or("-");
                        println!(
                            "  {} {} -> {}: {} ({})",
                            s.date.format("%Y-%m-%d"),
                            s.payer,
                            s.receiver,
                            format_cents(s.amount_cents),
                            note
                        );
                    }
                }
            }

            Commands::Balance { friend } => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                match friend {
                    Some(name) => {
                        let overview = service.friend_overview(&name).await?;
                        print_overview(&overview, &self.user);
                    }
                    None => {
                        let overviews = service.all_overviews().await?;
                        if overviews.is_empty() {
                            println!("No friends yet. Add one with: splitbook friend add <name>");
                        }
                        for overview in &overviews {
                            print_balance_line(overview);
                        }
                    }
                }
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = SplitService::connect(&self.database, self.user.as_str()).await?;
                run_export_command(&service, &export_type, output, format).await?;
            }
        }

        Ok(())
    }
}

async fn run_friend_command(service: &SplitService, command: FriendCommands) -> Result<()> {
    match command {
        FriendCommands::Add { name } => {
            let friend = service.add_friend(&name).await?;
            println!("Added friend: {}", friend.name);
        }
        FriendCommands::List => {
            let friends = service.list_friends().await?;
            if friends.is_empty() {
                println!("No friends yet");
            } else {
                for friend in &friends {
                    println!("{}  (since {})", friend.name, friend.created_at.format("%Y-%m-%d"));
                }
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &SplitService,
    export_type: &str,
    output: Option<String>,
    format: Option<String>,
) -> Result<()> {
    let exporter = Exporter::new(service);
    let to_file = output.is_some();
    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file '{}'", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    let format = format.unwrap_or_else(|| {
        if export_type == "full" { "json" } else { "csv" }.to_string()
    });

    let count = match export_type {
        "bills" => match format.as_str() {
            "csv" => exporter.export_bills_csv(&mut writer).await?,
            other => bail!("Unsupported format '{}' for bills. Use: csv", other),
        },
        "balances" => match format.as_str() {
            "csv" => exporter.export_balances_csv(&mut writer).await?,
            other => bail!("Unsupported format '{}' for balances. Use: csv", other),
        },
        "full" => match format.as_str() {
            "json" => {
                let snapshot = exporter.export_full_json(&mut writer).await?;
                snapshot.bills.len()
            }
            other => bail!("Unsupported format '{}' for full. Use: json", other),
        },
        other => bail!("Unknown export type '{}'. Use: bills, balances, full", other),
    };

    if to_file {
        println!(
            "Exported {} {} record(s) to {}",
            count,
            export_type,
            output.unwrap_or_default()
        );
    }
    Ok(())
}

fn print_overview(overview: &FriendOverview, user: &str) {
    if overview.friend == user {
        println!("Balance overview for {}:", user);
        println!("  You owe others: {}", format_cents(overview.balance.you_owe));
        println!("  Others owe you: {}", format_cents(overview.balance.owes_you));
        return;
    }

    if overview.balance.is_settled() {
        println!("You and {} are all settled up", overview.friend);
    } else if overview.balance.owes_you > 0 {
        println!(
            "{} owes you {}",
            overview.friend,
            format_cents(overview.balance.owes_you)
        );
    } else {
        println!(
            "You owe {} {}",
            overview.friend,
            format_cents(overview.balance.you_owe)
        );
    }

    if !overview.others.breakdown.is_empty() {
        println!();
        println!("Other balances for {}:", overview.friend);
        for (person, balance) in &overview.others.breakdown {
            if *balance > 0 {
                println!(
                    "  {} owes {} {}",
                    person,
                    overview.friend,
                    format_cents(*balance)
                );
            } else if *balance < 0 {
                println!(
                    "  {} owes {} {}",
                    overview.friend,
                    person,
                    format_cents(-balance)
                );
            }
        }
        println!(
            "  {} owes others {} in total; others owe {} {}",
            overview.friend,
            format_cents(overview.others.friend_owes_others),
            overview.friend,
            format_cents(overview.others.others_owe_friend)
        );
    }
}

fn print_balance_line(overview: &FriendOverview) {
    if overview.balance.is_settled() {
        println!("{:<20} settled up", overview.friend);
    } else if overview.balance.owes_you > 0 {
        println!(
            "{:<20} owes you {}",
            overview.friend,
            format_cents(overview.balance.owes_you)
        );
    } else {
        println!(
            "{:<20} you owe {}",
            overview.friend,
            format_cents(overview.balance.you_owe)
        );
    }
}

fn parse_timestamp(date: Option<String>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => parse_date(&date_str)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)),
        None => Ok(Utc::now()),
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("Invalid time for date")?
        .and_utc())
}

fn parse_split_spec(split: &str, shares: &[String]) -> Result<SplitSpec> {
    match split {
        "equal" => Ok(SplitSpec::Equal),
        "exact" => Ok(SplitSpec::Exact(parse_shares(shares)?)),
        "percentage" => Ok(SplitSpec::Percentage(parse_shares(shares)?)),
        other => bail!(
            "Unknown split type '{}'. Use: equal, exact, percentage",
            other
        ),
    }
}

fn parse_shares(shares: &[String]) -> Result<HashMap<String, f64>> {
    if shares.is_empty() {
        bail!("Exact and percentage splits need at least one --share NAME=VALUE");
    }
    shares
        .iter()
        .map(|entry| {
            let (name, value) = entry
                .split_once('=')
                .with_context(|| format!("Invalid share '{}'. Use NAME=VALUE", entry))?;
            let value: f64 = value
                .parse()
                .with_context(|| format!("Invalid share value in '{}'", entry))?;
            Ok((name.to_string(), value))
        })
        .collect()
}
