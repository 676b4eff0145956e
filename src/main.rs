use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rtv::controller::Controller;
use rtv::domain::{RTVConfig, RTVError, expand_path};
use rtv::model::{Model, Status};
use rtv::table_data::{Gvr, ViewSetting};
use rtv::ui::TableUI;
use rtv::watcher::{Snapshot, SnapshotSource, Watcher};

/// Live view of a resource table that is refreshed in place.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// CSV, Parquet or Arrow file holding the current resources
    path: String,

    /// Resource type shown in the title, defaults to the file name
    #[arg(long)]
    gvr: Option<String>,

    /// Only show resources of this namespace
    #[arg(short, long, default_value = "")]
    namespace: String,

    /// Column identifying a resource, defaults to the first column
    #[arg(long)]
    id_column: Option<String>,

    /// Columns to display, in order
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Sort column as NAME:asc or NAME:desc
    #[arg(long, default_value = "")]
    sort: String,

    /// Columns only shown in wide mode
    #[arg(long, value_delimiter = ',')]
    wide_columns: Vec<String>,

    /// Start in wide mode
    #[arg(long)]
    wide: bool,

    /// Only show rows containing this text, a leading ! inverts the match
    #[arg(long, default_value = "")]
    filter: String,

    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    refresh_ms: u64,

    /// Key event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file, the terminal belongs to the UI
    #[arg(long, default_value = "rtv.log")]
    log_file: String,
}

impl Args {
    fn into_config(self) -> Result<RTVConfig, RTVError> {
        let path = expand_path(&self.path)?;
        let gvr = match self.gvr {
            Some(gvr) => Gvr::new(gvr),
            None => Gvr::new(file_stem(&path)),
        };
        let view = ViewSetting::default()
            .with_columns(self.columns)
            .with_sort_column(self.sort)
            .with_wide(self.wide);

        Ok(RTVConfig::default()
            .with_path(path)
            .with_gvr(gvr)
            .with_namespace(self.namespace)
            .with_id_column(self.id_column)
            .with_wide_columns(self.wide_columns)
            .with_view(view)
            .with_filter(self.filter)
            .with_refresh_ms(self.refresh_ms)
            .with_event_poll_time(self.poll_ms)
            .with_log_file(expand_path(&self.log_file)?))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string()
}

fn main() -> ExitCode {
    let result = Args::parse().into_config().and_then(|cfg| {
        init_logging(&cfg)?;
        run(&cfg)
    });

    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(cfg: &RTVConfig) -> Result<(), RTVError> {
    let file = File::create(&cfg.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cfg: &RTVConfig) -> Result<(), RTVError> {
    info!("Starting rtv for {}", cfg.path.display());

    // Fail before taking over the terminal if the file cannot be read at all.
    let source = SnapshotSource::new(cfg)?;
    let (_watcher, snapshots) = Watcher::spawn(source, Duration::from_millis(cfg.refresh_ms));

    let mut terminal = ratatui::init();
    let result = event_loop(cfg, &mut terminal, &snapshots);
    ratatui::restore();

    info!("Bye");
    result
}

fn event_loop(
    cfg: &RTVConfig,
    terminal: &mut DefaultTerminal,
    snapshots: &Receiver<Result<Snapshot, RTVError>>,
) -> Result<(), RTVError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, size.height as usize);
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Apply everything the watcher produced since the last frame
        loop {
            match snapshots.try_recv() {
                Ok(Ok(snapshot)) => {
                    model.apply_snapshot(snapshot);
                }
                Ok(Err(e)) => model.snapshot_failed(&e),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(RTVError::LoadingFailed("watcher stopped".into()));
                }
            }
        }

        // Handle events and map to a Message
        let message = controller.handle_event()?;
        model.update(message);
    }
    Ok(())
}
