use clap::Parser;
use ratatui::DefaultTerminal;
use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod chart;
mod controller;
mod domain;
mod inputter;
mod model;
mod session;
mod table;
mod ui;

use chart::ChartKind;
use controller::Controller;
use domain::{AppConfig, DEFAULT_COLUMNS, DEFAULT_ROWS, TPError};
use model::{Model, Status};
use session::Session;
use ui::FormUI;

/// Enter a small numeric table and view it as a chart in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of rows (1-20)
    #[arg(short, long, default_value_t = DEFAULT_ROWS)]
    rows: usize,

    /// Number of columns (1-5)
    #[arg(short, long, default_value_t = DEFAULT_COLUMNS)]
    columns: usize,

    /// Chart shown at startup
    #[arg(long, value_enum, default_value_t = ChartKind::GroupedBar)]
    chart: ChartKind,

    /// Seed for the randomize action
    #[arg(long)]
    seed: Option<u64>,

    /// Fill every row with random values at startup
    #[arg(long)]
    randomize: bool,

    /// Terminal event poll timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Write logs to this file (filter with RUST_LOG)
    #[arg(long)]
    log_file: Option<String>,

    /// Print the table and chart description and exit
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &str) -> Result<(), TPError> {
    let path = shellexpand::full(path).map_err(|e| TPError::InvalidLogFile(e.to_string()))?;
    let file = File::create(&*path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TPError> {
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let cfg = AppConfig::default()
        .rows(args.rows)
        .columns(args.columns)
        .chart(args.chart)
        .seed(args.seed)
        .randomize(args.randomize)
        .event_poll_time(args.poll_ms);
    info!("Starting tabplot with {:?}", cfg);

    if args.dump {
        return dump(&cfg);
    }

    let mut model = Model::init(&cfg)?;
    let mut ui = FormUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();
    info!("Exiting tabplot");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut FormUI,
    controller: &Controller,
) -> Result<(), TPError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(model)? {
            model.update(message)?;
        };
    }
    Ok(())
}

fn dump(cfg: &AppConfig) -> Result<(), TPError> {
    let mut session = Session::new(cfg);
    let payload = session.render()?;
    println!("{}", payload.table_text);
    match payload.chart {
        Ok(chart) => print!("{chart}"),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_have_form_defaults() {
        let args = Args::parse_from(["tabplot"]);
        assert_eq!((args.rows, args.columns), (6, 4));
        assert_eq!(args.chart, ChartKind::GroupedBar);
        assert!(!args.dump);
    }

    #[test]
    fn chart_names_parse() {
        let args = Args::parse_from(["tabplot", "--chart", "heatmap", "-r", "2", "-c", "3"]);
        assert_eq!(args.chart, ChartKind::Heatmap);
        assert_eq!((args.rows, args.columns), (2, 3));
        assert!(Args::try_parse_from(["tabplot", "--chart", "line"]).is_err());
    }

    #[test]
    fn dump_renders_without_terminal() {
        let cfg = AppConfig::default().seed(Some(5)).randomize(true);
        assert!(dump(&cfg).is_ok());
    }
}
