use std::io::{self, Read};
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};
use sift_chain::cli::{self, CliError, ProposeOptions, ProposeResult, SessionOptions, ViewArgs};
use sift_chain::explorer::DraftTarget;
use sift_chain::output::{rows_to_json, rows_to_json_pretty};
use sift_chain::translate::{ResponseTranslator, Translator};
use sift_chain::{NodeId, Row};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "sift")]
#[command(about = "Sift - chain natural-language filters over the H1B dataset into one SQL query")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the step tree
    Tree,

    /// Add a step from a prompt and the translator's JSON response
    Add {
        /// Parent step (omit to start from the base dataset)
        #[arg(long)]
        parent: Option<String>,

        /// What the step should do, in words
        #[arg(long)]
        prompt: String,

        /// Translator response JSON (reads from stdin if not provided)
        #[arg(long)]
        response: Option<String>,

        /// Keep the step even if it returns no rows
        #[arg(long)]
        keep_empty: bool,
    },

    /// Replace a step from a new prompt and translator response
    Edit {
        id: String,

        #[arg(long)]
        prompt: String,

        /// Translator response JSON (reads from stdin if not provided)
        #[arg(long)]
        response: Option<String>,

        #[arg(long)]
        keep_empty: bool,
    },

    /// Delete a leaf step
    Delete { id: String },

    /// Make a step active (omit the id for the base dataset)
    Activate { id: Option<String> },

    /// Delete every step
    Reset,

    /// Print the composed query for the active view
    Compose {
        #[command(flatten)]
        view: ViewArgs,

        /// Print the count query instead
        #[arg(long)]
        count: bool,
    },

    /// Run the active view and print the page as JSON
    Run {
        #[command(flatten)]
        view: ViewArgs,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Run a raw query
    Sql {
        query: String,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Headline figures for the base dataset
    Stats,

    /// Distinct values of a base column, most frequent first
    Values { column: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.session.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let translator = match &cli.command {
        Commands::Add { response, .. } | Commands::Edit { response, .. } => {
            let response = read_response(response.clone())?;
            Some(Arc::new(ResponseTranslator::new(response)) as Arc<dyn Translator>)
        }
        _ => None,
    };
    let mut explorer = cli.session.open(translator)?;

    match cli.command {
        Commands::Tree => print!("{}", cli::render_tree(explorer.store())),
        Commands::Add {
            parent,
            prompt,
            keep_empty,
            ..
        } => {
            let parent = parent.as_deref().map(NodeId::parse).transpose()?;
            let options = ProposeOptions {
                target: DraftTarget::Add { parent },
                prompt,
                keep_empty,
            };
            report_proposal("Added", cli::execute_propose(&mut explorer, options).await?);
        }
        Commands::Edit {
            id,
            prompt,
            keep_empty,
            ..
        } => {
            let options = ProposeOptions {
                target: DraftTarget::Edit {
                    node: NodeId::parse(&id)?,
                },
                prompt,
                keep_empty,
            };
            report_proposal("Updated", cli::execute_propose(&mut explorer, options).await?);
        }
        Commands::Delete { id } => {
            let id = NodeId::parse(&id)?;
            if !explorer.delete(&id) {
                return Err(CliError::Rejected(format!(
                    "Cannot delete {}: it does not exist or has children",
                    id
                )));
            }
            println!("Deleted {}", id);
        }
        Commands::Activate { id } => {
            let id = id.as_deref().map(NodeId::parse).transpose()?;
            if !explorer.activate(id.as_ref()) {
                return Err(CliError::Rejected("No such step".to_string()));
            }
            print!("{}", cli::render_tree(explorer.store()));
        }
        Commands::Reset => {
            explorer.reset_tree();
            println!("Tree cleared");
        }
        Commands::Compose { view, count } => {
            view.apply(&mut explorer);
            let queries = explorer.current_queries();
            println!("{}", if count { queries.count } else { queries.data });
        }
        Commands::Run { view, pretty } => {
            view.apply(&mut explorer);
            let page = explorer.refresh().await?;
            print_rows(&page.rows, pretty);
            eprintln!(
                "page {} of {} ({} rows)",
                explorer.view().page,
                explorer.total_pages().max(1),
                explorer.displayed().total_rows
            );
        }
        Commands::Sql { query, pretty } => {
            let rows = explorer.run_sql(&query).await?;
            print_rows(&rows, pretty);
        }
        Commands::Stats => {
            let stats = explorer.stats().await?;
            println!("Total applications: {}", stats.total);
            println!("Certified:          {}", stats.certified);
            println!("Average salary:     {:.0}", stats.avg_salary);
            println!("New hires:          {}", stats.new_hires);
        }
        Commands::Values { column } => {
            for value in explorer.unique_values(&column).await? {
                println!("{}", value.as_string());
            }
        }
    }
    Ok(())
}

fn read_response(response: Option<String>) -> Result<String, CliError> {
    match response {
        Some(s) => Ok(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            Ok(buffer)
        }
        None => Err(CliError::NoResponse),
    }
}

fn report_proposal(verb: &str, result: ProposeResult) {
    match result {
        ProposeResult::Committed(id) => println!("{} {}", verb, id),
        ProposeResult::KeptEmpty(id) => println!("{} {} (returns no rows)", verb, id),
        ProposeResult::Clarification(question) => println!("Clarification needed: {}", question),
    }
}

fn print_rows(rows: &[Row], pretty: bool) {
    let json = if pretty {
        rows_to_json_pretty(rows)
    } else {
        rows_to_json(rows)
    };
    println!("{}", json);
}
