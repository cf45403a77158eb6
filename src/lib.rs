pub mod aggregate;
pub mod cli;
pub mod columns;
pub mod data;
pub mod filter;
pub mod flatten;
pub mod io_utils;
pub mod pivot;
pub mod saved;
pub mod schema;
pub mod spec_file;
pub mod store;
pub mod table;
pub mod tree;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, ensure};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat, SpecArgs},
    data::{Dataset, field_text},
    filter::parse_filters,
    pivot::{PivotDimensionField, PivotSession, PivotSpec, PivotValueField, SortOrder},
    saved::SavedPivot,
    store::PivotStore,
    tree::NodeId,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("pivot_workbench", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Pivot(args) => handle_pivot(&args),
        Commands::Save(args) => handle_save(&args),
        Commands::List(args) => handle_list(&args),
        Commands::Remove(args) => handle_remove(&args),
    }
}

fn load_source(args: &InputArgs) -> Result<Dataset> {
    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("An input file is required (--input)"))?;
    let delimiter = io_utils::resolve_input_delimiter(input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Loading '{}' with delimiter '{}'",
        input.display(),
        printable_delimiter(delimiter)
    );
    io_utils::load_dataset(input, delimiter, encoding)
        .with_context(|| format!("Loading dataset from {input:?}"))
}

/// Appends the inline options to `spec` and applies the global switches.
fn apply_spec_args(mut spec: PivotSpec, args: &SpecArgs) -> Result<PivotSpec> {
    for raw in args.rows.iter().filter(|r| !r.trim().is_empty()) {
        spec.rows.push(PivotDimensionField::parse(raw)?);
    }
    for raw in args.columns.iter().filter(|c| !c.trim().is_empty()) {
        spec.columns.push(PivotDimensionField::parse(raw)?);
    }
    for raw in args.values.iter().filter(|v| !v.trim().is_empty()) {
        spec.values.push(raw.parse::<PivotValueField>()?);
    }
    spec.filters.extend(parse_filters(&args.filters)?);
    for dim in spec.rows.iter_mut().chain(spec.columns.iter_mut()) {
        if args.totals {
            dim.show_totals = true;
        }
        if args.desc {
            dim.order = SortOrder::Desc;
        }
    }
    Ok(spec)
}

fn build_spec(args: &SpecArgs) -> Result<PivotSpec> {
    let base = match &args.spec {
        Some(path) => spec_file::load_spec(path)?,
        None => PivotSpec::default(),
    };
    apply_spec_args(base, args)
}

fn ensure_value_fields_exist(dataset: &Dataset, spec: &PivotSpec) -> Result<()> {
    let fields = dataset.fields();
    for value in &spec.values {
        ensure!(
            fields.contains(&value.field),
            "Value field '{}' is not a column of '{}'",
            value.field,
            dataset.name
        );
    }
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let dataset = load_source(&args.source)?;
    let headers = ["field", "type", "default", "distinct", "blank"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = dataset
        .fields()
        .into_iter()
        .map(|field| {
            let ty = dataset.field_type(&field);
            let distinct = filter::distinct_values(&dataset.data, &field);
            let blank = dataset
                .data
                .iter()
                .filter(|row| field_text(row, &field).is_empty())
                .count();
            vec![
                field,
                ty.to_string(),
                ty.default_aggregation().to_string(),
                distinct.len().to_string(),
                blank.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Inferred {} field(s) over {} row(s)",
        rows.len(),
        dataset.row_count
    );
    Ok(())
}

fn handle_pivot(args: &cli::PivotArgs) -> Result<()> {
    let (dataset, spec) = match &args.pivot {
        Some(pivot_id) => {
            let store_path = args
                .store
                .as_deref()
                .ok_or_else(|| anyhow!("--pivot requires --store"))?;
            let store = PivotStore::load_snapshot(store_path)
                .with_context(|| format!("Loading store from {store_path:?}"))?;
            let saved = store
                .pivot(pivot_id)
                .ok_or_else(|| anyhow!("Saved pivot '{pivot_id}' not found"))?;
            let dataset = store
                .dataset(&saved.dataset_id)
                .cloned()
                .ok_or_else(|| anyhow!("Dataset '{}' not found", saved.dataset_id))?;
            info!("Computing saved pivot '{}'", saved.title);
            (dataset, apply_spec_args(saved.to_spec(), &args.spec)?)
        }
        None => (load_source(&args.source)?, build_spec(&args.spec)?),
    };
    dataset.validate()?;
    ensure_value_fields_exist(&dataset, &spec)?;
    if spec.values.is_empty() {
        warn!("No value fields given; the pivot has nothing to aggregate");
    }
    if let Some(path) = &args.save_spec {
        spec_file::save_spec(path, &spec)?;
        info!("Spec written to {path:?}");
    }

    let mut session = PivotSession::new(dataset, spec);
    if args.expand_all {
        session.expand_all();
    }
    for raw in &args.expand {
        let id = NodeId::from(raw.trim());
        if session.table().find(&id).is_none() {
            warn!("No pivot row with id '{id}'");
        } else if !session.expansion().is_expanded(&id) {
            session.toggle(&id);
        }
    }
    debug!(
        "Pivot has {} column(s) and {} visible row(s)",
        session.table().columns.len(),
        session.visible_rows().len()
    );

    let mut writer = io_utils::open_output(args.output.as_deref())?;
    match args.format {
        OutputFormat::Table => {
            let rendered =
                table::render_pivot(session.table(), session.expansion(), &session.spec().rows);
            writer.write_all(rendered.as_bytes())?;
        }
        OutputFormat::Csv => {
            io_utils::write_pivot_csv(
                &mut writer,
                session.table(),
                &session.visible_rows(),
                io_utils::DEFAULT_CSV_DELIMITER,
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, session.table())?;
            writeln!(writer)?;
        }
    }
    writer.flush().context("Flushing pivot output")?;
    Ok(())
}

fn handle_save(args: &cli::SaveArgs) -> Result<()> {
    let mut store = PivotStore::load_snapshot(&args.store)
        .with_context(|| format!("Loading store from {:?}", args.store))?;
    let loaded = load_source(&args.source)?;
    let spec = build_spec(&args.spec)?;
    ensure_value_fields_exist(&loaded, &spec)?;

    let existing = store
        .datasets()
        .iter()
        .find(|d| d.name == loaded.name)
        .map(|d| d.id.clone());
    let dataset_id = match existing {
        Some(id) => {
            store.update_dataset(&id, |dataset| {
                dataset.schema = loaded.schema;
                dataset.data = loaded.data;
            })?;
            debug!("Refreshed dataset {id}");
            id
        }
        None => store.add_dataset(loaded),
    };

    let saved = SavedPivot::from_spec(&dataset_id, args.title.as_deref(), &spec);
    let title = saved.title.clone();
    let pivot_id = store.add_pivot(saved)?;
    store.set_active_dataset(Some(&dataset_id))?;
    store.set_active_pivot(Some(&pivot_id))?;
    save_store(&store, &args.store)?;
    info!("Saved pivot '{title}' as {pivot_id}");
    println!("{pivot_id}");
    Ok(())
}

fn save_store(store: &PivotStore, path: &Path) -> Result<()> {
    store
        .save_snapshot(path)
        .with_context(|| format!("Writing store to {path:?}"))
}

fn handle_list(args: &cli::ListArgs) -> Result<()> {
    let store = PivotStore::load_snapshot(&args.store)
        .with_context(|| format!("Loading store from {:?}", args.store))?;

    let headers = ["id", "name", "rows", "fields", "updated"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = store
        .datasets()
        .iter()
        .map(|d| {
            vec![
                d.id.clone(),
                d.name.clone(),
                d.row_count.to_string(),
                d.fields().len().to_string(),
                d.updated_at.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    println!();

    let headers = ["id", "dataset", "title", "rows", "columns", "values"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = store
        .pivots()
        .iter()
        .map(|p| {
            let dataset = store
                .dataset(&p.dataset_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| p.dataset_id.clone());
            vec![
                p.id.clone(),
                dataset,
                p.title.clone(),
                p.rows.join(", "),
                p.columns.join(", "),
                p.values
                    .iter()
                    .map(PivotValueField::label)
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "{} dataset(s), {} saved pivot(s)",
        store.datasets().len(),
        store.pivots().len()
    );
    Ok(())
}

fn handle_remove(args: &cli::RemoveArgs) -> Result<()> {
    let mut store = PivotStore::load_snapshot(&args.store)
        .with_context(|| format!("Loading store from {:?}", args.store))?;
    if let Some(pivot_id) = &args.pivot {
        store.delete_pivot(pivot_id)?;
        info!("Removed pivot {pivot_id}");
    } else if let Some(dataset_id) = &args.dataset {
        let cascaded = store.pivots_for_dataset(dataset_id).count();
        store.delete_dataset(dataset_id)?;
        info!("Removed dataset {dataset_id} and {cascaded} pivot(s)");
    }
    save_store(&store, &args.store)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
