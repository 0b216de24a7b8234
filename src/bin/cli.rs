//! AtlasDoc CLI
//!
//! Command-line interface for inspecting and editing an AtlasDoc file.

use std::path::PathBuf;
use std::process;

use atlasdoc::{Change, Config, Database, DocId, Document, Query, Selector};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDoc CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdoc")]
#[command(about = "CLI for the AtlasDoc embedded document store")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./atlasdoc.json")]
    file: PathBuf,

    /// Use the checksummed framed format instead of plain JSON
    #[arg(long)]
    framed: bool,

    /// Table to operate on
    #[arg(short, long, default_value = atlasdoc::config::DEFAULT_TABLE)]
    table: String,

    /// Indent JSON written to the database file
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a JSON object, printing its id
    Insert {
        /// The document, e.g. '{"name": "ada"}'
        document: String,

        /// Store under this id instead of allocating one
        #[arg(long)]
        id: Option<DocId>,
    },

    /// Get a document by id
    Get {
        /// The document id
        id: DocId,
    },

    /// List every document in the table
    All,

    /// Find documents whose field equals a JSON value
    Search {
        /// Field name
        field: String,

        /// JSON value, e.g. '"ada"' or '42'
        value: String,
    },

    /// Merge a JSON object into a document
    Update {
        /// The document id
        id: DocId,

        /// Fields to merge
        fields: String,
    },

    /// Remove a document by id
    Remove {
        /// The document id
        id: DocId,
    },

    /// List table names
    Tables,

    /// Drop a whole table
    Drop {
        /// The table to drop
        table: String,
    },

    /// Remove every document from the table
    Truncate,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,atlasdoc=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> atlasdoc::Result<()> {
    let builder = Config::builder().pretty_json(args.pretty);
    let config = if args.framed {
        builder.framed_file(&args.file)
    } else {
        builder.json_file(&args.file)
    }
    .build();

    let mut db = Database::open(config)?;

    let output = match args.command {
        Commands::Insert { document, id } => {
            let value = parse_json(&document)?;
            let table = db.table(&args.table);
            let id = match id {
                Some(id) => table.insert(Document::from_value(id, value)?)?,
                None => table.insert(value)?,
            };
            json!({ "id": id })
        }
        Commands::Get { id } => match db.table(&args.table).get(id)? {
            Some(doc) => render(&doc),
            None => Value::Null,
        },
        Commands::All => {
            let docs = db.table(&args.table).all()?;
            Value::Array(docs.iter().map(render).collect())
        }
        Commands::Search { field, value } => {
            let query = Query::field_eq(field, parse_json(&value)?);
            let docs = db.table(&args.table).search(&query)?;
            Value::Array(docs.iter().map(render).collect())
        }
        Commands::Update { id, fields } => {
            let change = Change::merge(parse_json(&fields)?)?;
            let ids = db.table(&args.table).update(change, Selector::Ids(vec![id]))?;
            json!({ "updated": ids })
        }
        Commands::Remove { id } => {
            let ids = db.table(&args.table).remove(id)?;
            json!({ "removed": ids })
        }
        Commands::Tables => json!(db.table_names()?),
        Commands::Drop { table } => json!({ "dropped": db.drop_table(&table)? }),
        Commands::Truncate => {
            db.table(&args.table).truncate()?;
            json!({ "truncated": args.table })
        }
    };

    println!("{}", output);
    db.close()
}

fn parse_json(text: &str) -> atlasdoc::Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Document as printed: its id next to its fields
fn render(doc: &Document) -> Value {
    json!({ "_id": doc.id, "doc": doc.to_value() })
}
