use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grimoire::config::{DEFAULT_DATABASE, DEFAULT_PLAYLIST_DIR, DEFAULT_STORE_PATH};
use grimoire::model::{value_text, RecordId, CHECK_AT_LEAST};
use grimoire::records::{input_path, AssumeYes, Confirm, PathParser, RecordParser, RemoveScope, TagParser};
use grimoire::rename::Template;
use grimoire::{AppContext, GrimoireConfig, PlaylistManager};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grimoire")]
#[command(about = "Manage Grimoire playlists and their records", long_about = None)]
struct Args {
    /// Directory holding the playlist files
    #[arg(short = 'd', long, default_value = DEFAULT_PLAYLIST_DIR)]
    playlists: String,

    /// Path to the record store (JSON)
    #[arg(short = 's', long, default_value = DEFAULT_STORE_PATH)]
    store: String,

    /// Database partition for new playlists
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Leading content tokens checked to tell id lists from queries
    #[arg(long, default_value_t = CHECK_AT_LEAST)]
    check_at_least: usize,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List playlists in sort order
    List,

    /// Show the rows of a playlist
    Show {
        /// Playlist basename or screen name
        playlist: String,

        /// Columns to print besides the id
        #[arg(short = 'c', long = "column")]
        columns: Vec<String>,
    },

    /// Create and save an empty playlist
    Create {
        name: String,

        /// Sort order among playlists
        #[arg(long, default_value = "1")]
        order: String,

        /// Database partition (defaults to --database)
        #[arg(long = "in")]
        in_database: Option<String>,
    },

    /// Make a playlist an explicit list of record ids
    SetIds { playlist: String, ids: Vec<u64> },

    /// Make a playlist query-backed
    SetQuery { playlist: String, query: String },

    /// Move rows to an offset among the remaining rows
    Move {
        playlist: String,

        #[arg(long, num_args = 1.., required = true)]
        ids: Vec<u64>,

        #[arg(long)]
        to: usize,
    },

    /// Delete playlists (the default playlist always comes back)
    Delete {
        #[arg(required = true)]
        playlists: Vec<String>,
    },

    /// Add files as records and append them to a playlist
    Add {
        playlist: String,

        /// Paths or file:// URIs
        #[arg(required = true)]
        paths: Vec<String>,

        /// Record file facts only, without reading audio tags
        #[arg(long)]
        no_tags: bool,
    },

    /// Remove rows from a playlist, optionally from the store and disk
    Remove {
        playlist: String,

        #[arg(long, num_args = 1.., required = true)]
        ids: Vec<u64>,

        /// Also delete the records from the store
        #[arg(long)]
        from_store: bool,

        /// Also delete the records' files (implies --from-store)
        #[arg(long)]
        delete_files: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Move record files according to a path template
    Rename {
        playlist: String,

        /// Path template, e.g. "{artist|slug}/{title}.{ext}"
        #[arg(short = 't', long)]
        template: String,

        /// Directory the rendered paths are relative to
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Move the files (otherwise only print the plan)
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = GrimoireConfig::from_paths(&args.playlists, &args.store)
        .with_database(args.database.clone())
        .with_check_at_least(args.check_at_least);
    let mut ctx = AppContext::open(config).context("Failed to open Grimoire session")?;

    run(&mut ctx, args.command)?;

    ctx.shutdown().context("Failed to close Grimoire session")?;
    Ok(())
}

fn run(ctx: &mut AppContext, command: Command) -> Result<()> {
    match command {
        Command::List => {
            for basename in ctx.playlists.sorted_basenames() {
                let Some(playlist) = ctx.playlists.get_mut(&basename) else {
                    continue;
                };
                match playlist.load_metadata() {
                    Ok(meta) => println!(
                        "{:<20} {:<6} {:<12} {}",
                        basename, meta.order, meta.database, meta.screen_name
                    ),
                    Err(e) => println!("{:<20} <unreadable: {}>", basename, e),
                }
            }
        }

        Command::Show { playlist, columns } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let view = ctx.view(&basename)?;
            let columns = if columns.is_empty() {
                view.table()
                    .columns()
                    .iter()
                    .filter(|c| !c.starts_with('_'))
                    .take(3)
                    .cloned()
                    .collect()
            } else {
                columns
            };

            for record in view.table().rows() {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| record.get(c).map(value_text).unwrap_or_default())
                    .collect();
                println!("{:>8}  {}", record.id, cells.join("  "));
            }
            log::info!("{} rows", view.table().row_count());
        }

        Command::Create {
            name,
            order,
            in_database,
        } => {
            let database = in_database.unwrap_or_else(|| ctx.config.default_database.clone());
            let playlist = ctx.playlists.create_in(&name, &order, &database);
            playlist.save()?;
            println!("{}", playlist.basename());
        }

        Command::SetIds { playlist, ids } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let playlist = ctx.playlists.require_mut(&basename)?;
            playlist.set_ids(ids.into_iter().map(RecordId).collect());
            playlist.save()?;
        }

        Command::SetQuery { playlist, query } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let playlist = ctx.playlists.require_mut(&basename)?;
            playlist.set_query(query)?;
            playlist.save()?;
        }

        Command::Move { playlist, ids, to } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let mut view = ctx.view(&basename)?;
            let moved: Vec<RecordId> = ids.into_iter().map(RecordId).collect();
            let order = view.move_rows(&mut ctx.playlists, &moved, to)?;
            log::info!("New order: {:?}", order.iter().map(|id| id.0).collect::<Vec<_>>());
        }

        Command::Delete { playlists } => {
            let mut basenames = Vec::with_capacity(playlists.len());
            for name in &playlists {
                basenames.push(resolve_playlist(&mut ctx.playlists, name)?);
            }
            let refs: Vec<&str> = basenames.iter().map(String::as_str).collect();
            let removed = ctx.playlists.delete(&refs)?;
            log::info!("Deleted {} playlists", removed);
        }

        Command::Add {
            playlist,
            paths,
            no_tags,
        } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let mut view = ctx.view(&basename)?;
            let paths: Vec<PathBuf> = paths.iter().map(|p| input_path(p)).collect();
            let parser: &dyn RecordParser = if no_tags { &PathParser } else { &TagParser };

            let outcomes = view.add_paths(&mut ctx.playlists, &mut ctx.connection, &paths, parser)?;
            for outcome in &outcomes {
                log::debug!("{:?}", outcome);
            }
        }

        Command::Remove {
            playlist,
            ids,
            from_store,
            delete_files,
            yes,
        } => {
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let mut view = ctx.view(&basename)?;
            let scope = if delete_files {
                RemoveScope::StoreAndResource
            } else if from_store {
                RemoveScope::Store
            } else {
                RemoveScope::View
            };
            let ids: Vec<RecordId> = ids.into_iter().map(RecordId).collect();

            let mut assume_yes = AssumeYes;
            let mut ask = ask_on_terminal;
            let confirm: &mut dyn Confirm = if yes || !ctx.config.confirm_destructive {
                &mut assume_yes
            } else {
                &mut ask
            };
            let report = view.remove(&mut ctx.playlists, &mut ctx.connection, &ids, scope, confirm)?;
            if report.aborted {
                log::warn!("Nothing removed");
            }
            if report.save_failed {
                log::error!("Rows were removed but playlist {} could not be saved", basename);
            }
        }

        Command::Rename {
            playlist,
            template,
            root,
            apply,
        } => {
            let template = Template::compile(&template)?;
            let basename = resolve_playlist(&mut ctx.playlists, &playlist)?;
            let mut view = ctx.view(&basename)?;
            let root = PathBuf::from(shellexpand::tilde(&root.to_string_lossy()).as_ref());

            let plans = view.plan_renames(&template, &root)?;
            for plan in &plans {
                println!("{:>8}  {} -> {}", plan.id, plan.from.display(), plan.to.display());
            }
            if apply {
                view.apply_renames(&mut ctx.playlists, &mut ctx.connection, &plans)?;
            } else {
                log::info!("{} moves planned; pass --apply to carry them out", plans.len());
            }
        }
    }
    Ok(())
}

/// Accept a basename, or a unique screen name
fn resolve_playlist(manager: &mut PlaylistManager, name: &str) -> Result<String> {
    if manager.contains(name) {
        return Ok(name.to_string());
    }

    let mut matches = Vec::new();
    for basename in manager.sorted_basenames() {
        let Some(playlist) = manager.get_mut(&basename) else {
            continue;
        };
        if playlist.screen_name().map(|s| s == name).unwrap_or(false) {
            matches.push(basename);
        }
    }

    match matches.len() {
        0 => bail!("No playlist named {:?}", name),
        1 => Ok(matches.remove(0)),
        _ => bail!("{:?} is ambiguous: {}", name, matches.join(", ")),
    }
}

fn ask_on_terminal(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}
