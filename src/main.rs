use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use winamp_tools::export::ByteSize;
use winamp_tools::math::{self, MathMethod, MathOptions};
use winamp_tools::model::format::code_page;
use winamp_tools::model::PlaylistFormat;
use winamp_tools::prompt::ConsolePrompter;
use winamp_tools::rebuild::{DefaultAction, RebuildOptions, RebuildStatus, Rebuilder, DEFAULT_ESCAPE};
use winamp_tools::tags::{LoftyTagger, Tagger};
use winamp_tools::winamp::{self, CatalogSummary, ShowFormat, SortKey};
use winamp_tools::{ExportConfig, ExportPipeline};

#[derive(Parser, Debug)]
#[command(name = "winamp-tools")]
#[command(about = "Rebuild, combine and export Winamp playlists", long_about = None)]
struct Args {
    /// Code page of *.m3u playlists
    #[arg(long, global = true, default_value = "windows-1252")]
    code_page: String,

    /// Compute everything, write nothing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display Winamp playlists
    Show {
        /// Winamp playlists file
        #[arg(
            short = 'i',
            long,
            default_value = "~/AppData/Roaming/Winamp/Plugins/ml/playlists.xml"
        )]
        infile: String,

        /// Sort by: lp|filename|title|id|songs|seconds
        #[arg(short = 's', long, default_value = "lp")]
        sort: SortKey,

        /// Sort descending
        #[arg(short = 'd', long)]
        desc: bool,

        /// Display format: raw|formatted
        #[arg(short = 'f', long, default_value = "raw")]
        format: ShowFormat,
    },

    /// Repair playlists whose tracks moved
    Rebuild {
        /// Single playlist (*.m3u, *.m3u8) or Winamp playlists.xml
        infile: String,

        /// Media folder with letter-range sub-folders
        #[arg(short = 'm', long)]
        media: String,

        /// Escape sub-folder inside the media folder
        #[arg(short = 'e', long, default_value = DEFAULT_ESCAPE)]
        esc: String,

        /// Sort playlist entries
        #[arg(long)]
        sort: bool,

        /// Remove duplicated entries
        #[arg(long)]
        dupes: bool,

        /// Default action for unresolved entries: ask|skip|remove|exit
        #[arg(short = 'a', long, default_value = "ask")]
        action: DefaultAction,

        /// Do not back up overwritten playlists
        #[arg(long)]
        no_backup: bool,

        /// Output format: m3u|m3u8
        #[arg(long)]
        format: Option<PlaylistFormat>,

        /// Do not write #EXTINF lines
        #[arg(long)]
        no_ext: bool,

        /// Save even when nothing changed
        #[arg(long)]
        force: bool,
    },

    /// Playlist arithmetic: a - b = o, a + b = o
    Math {
        a: String,
        b: String,
        o: String,

        /// Math method: add|sub
        #[arg(short = 'm', long, default_value = "sub")]
        method: MathMethod,

        /// Sort output playlist
        #[arg(long)]
        sort: bool,

        /// Do not write #EXTINF lines
        #[arg(long)]
        no_ext: bool,

        /// Do not back up overwritten playlist
        #[arg(long)]
        no_backup: bool,
    },

    /// Export playlists and their media files
    Export {
        /// JSON export configuration
        #[arg(short = 'c', long)]
        config: Option<String>,

        /// Winamp media library dir
        #[arg(long)]
        winamp_dir: Option<String>,

        /// Where generated playlists go
        #[arg(long)]
        output_dir: Option<String>,

        /// Where media files are copied
        #[arg(long)]
        export_dir: Option<String>,

        /// Total size limit: 44444, 120M, 3.4G (0 = unlimited)
        #[arg(long)]
        total_size: Option<String>,

        /// Create missing output dirs
        #[arg(long)]
        auto_dirs: bool,
    },
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else if args.quiet && !args.dry_run {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let cp = code_page(&args.code_page)?;
    if args.dry_run {
        log::info!("Dry run: no files will be changed");
    }

    match args.command {
        Command::Show {
            infile,
            sort,
            desc,
            format,
        } => {
            let mut catalog = winamp::load_catalog(&expand(&infile))?;
            if catalog.records.is_empty() {
                anyhow::bail!("Empty playlist!");
            }
            catalog.sort(sort, !desc);

            for row in winamp::render_listing(&catalog, format) {
                println!("{row}");
            }

            let summary = CatalogSummary::of(&catalog.records);
            log::info!(
                "Playlists: {} | Songs: {} | Duration: {}",
                summary.count,
                summary.songs,
                winamp::time_string(summary.seconds)
            );
        }

        Command::Rebuild {
            infile,
            media,
            esc,
            sort,
            dupes,
            action,
            no_backup,
            format,
            no_ext,
            force,
        } => {
            let mut options = RebuildOptions::new(expand(&media))
                .with_escape(esc)
                .with_action(action)
                .with_format(format)
                .with_code_page(cp);
            options.sort = sort;
            options.dupes = dupes;
            options.backup = !no_backup;
            options.force = force;
            options.dry_run = args.dry_run;

            let mut rebuilder = Rebuilder::new(options)?;
            if !no_ext {
                rebuilder = rebuilder.with_tagger(Arc::new(LoftyTagger::new()));
            }

            let mut prompter = ConsolePrompter::new();
            let report = rebuilder.run(&expand(&infile), &mut prompter)?;
            if report.status == RebuildStatus::Aborted {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Math {
            a,
            b,
            o,
            method,
            sort,
            no_ext,
            no_backup,
        } => {
            let options = MathOptions {
                method,
                sort,
                backup: !no_backup,
                dry_run: args.dry_run,
                code_page: cp,
                tagger: if no_ext {
                    None
                } else {
                    Some(Arc::new(LoftyTagger::new()) as Arc<dyn Tagger>)
                },
            };
            math::run(&expand(&a), &expand(&b), &expand(&o), &options)?;
        }

        Command::Export {
            config,
            winamp_dir,
            output_dir,
            export_dir,
            total_size,
            auto_dirs,
        } => {
            let mut config = match config {
                Some(path) => ExportConfig::load(&expand(&path))?,
                None => ExportConfig::default(),
            };
            if let Some(dir) = winamp_dir {
                config = config.with_winamp_dir(expand(&dir));
            }
            if let Some(dir) = output_dir {
                config = config.with_output_dir(expand(&dir));
            }
            if let Some(dir) = export_dir {
                config = config.with_export_dir(expand(&dir));
            }
            if let Some(size) = total_size {
                config = config.with_total_size(ByteSize::Text(size));
            }
            if auto_dirs {
                config = config.with_auto_dirs(true);
            }

            let pipeline = ExportPipeline::new(config)?
                .with_code_page(cp)
                .with_dry_run(args.dry_run);
            let report = pipeline.run(&mut ConsolePrompter::new())?;

            log::info!(
                "Exported {} tracks in {} playlist files, {} copied",
                report.stats.unique_items,
                report.playlists.len(),
                report.copied
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
