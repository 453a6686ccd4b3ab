use crate::config::{LoggingConfig, Section};
use std::{
    collections::HashMap,
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{level_filters::LevelFilter, Level, Metadata};
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt,
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    Layer,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 5;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// True if `target` is `subsystem` itself or one of its `::` children.
fn matches_subsystem(target: &str, subsystem: &str) -> bool {
    target
        .strip_prefix(subsystem)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// -------- rotating file sinks --------

type SharedRotation = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct RotatingFile(SharedRotation);

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> fmt::MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFile;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating_file(section: &Section, base_dir: &Path) -> std::io::Result<RotatingFile> {
    let path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let rot = FileRotate::new(
        &path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(RotatingFile(Arc::new(Mutex::new(rot))))
}

// -------- layer plan --------

/// Subsystem sections (everything except "default"), sorted for stable output.
fn subsystem_sections(cfg: &LoggingConfig) -> Vec<(&str, &Section)> {
    let mut sections: Vec<_> = cfg
        .iter()
        .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
        .map(|(name, section)| (name.as_str(), section))
        .collect();
    sections.sort_by_key(|(name, _)| *name);
    sections
}

fn console_targets(sections: &[(&str, &Section)]) -> Targets {
    sections
        .iter()
        .fold(Targets::new().with_default(LevelFilter::OFF), |t, (name, s)| {
            match parse_level(&s.console_level) {
                Some(level) => t.with_target(name.to_string(), LevelFilter::from_level(level)),
                None => t,
            }
        })
}

/// Filter for the "default" section: everything not claimed by a subsystem.
fn unclaimed_filter(
    claimed: Vec<String>,
    max_level: Level,
) -> FilterFn<impl Fn(&Metadata<'_>) -> bool + Send + Sync + 'static> {
    FilterFn::new(move |meta: &Metadata<'_>| {
        !claimed.iter().any(|c| matches_subsystem(meta.target(), c)) && *meta.level() <= max_level
    })
}

fn console_layer(ansi: bool) -> fmt::Layer<Registry> {
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true)
}

fn file_layer(sink: RotatingFile) -> impl Layer<Registry> + Send + Sync + 'static {
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_writer(sink)
}

fn build_layers(cfg: &LoggingConfig, base_dir: &Path, ansi: bool) -> Vec<BoxedLayer> {
    let sections = subsystem_sections(cfg);
    let claimed: Vec<String> = sections.iter().map(|(n, _)| n.to_string()).collect();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    layers.push(
        console_layer(ansi)
            .with_filter(console_targets(&sections))
            .boxed(),
    );

    for (name, section) in &sections {
        if section.file.trim().is_empty() {
            continue;
        }
        let Some(level) = parse_level(&section.file_level) else {
            continue;
        };
        match open_rotating_file(section, base_dir) {
            Ok(sink) => layers.push(
                file_layer(sink)
                    .with_filter(
                        Targets::new().with_target(name.to_string(), LevelFilter::from_level(level)),
                    )
                    .boxed(),
            ),
            Err(e) => eprintln!(
                "Failed to init log file for subsystem '{}': {} ({})",
                name, section.file, e
            ),
        }
    }

    if let Some(default) = cfg.get(DEFAULT_SECTION) {
        if let Some(level) = parse_level(&default.console_level) {
            layers.push(
                console_layer(ansi)
                    .with_filter(unclaimed_filter(claimed.clone(), level))
                    .boxed(),
            );
        }
        if !default.file.trim().is_empty() {
            if let Some(level) = parse_level(&default.file_level) {
                match open_rotating_file(default, base_dir) {
                    Ok(sink) => layers.push(
                        file_layer(sink)
                            .with_filter(unclaimed_filter(claimed, level))
                            .boxed(),
                    ),
                    Err(e) => eprintln!(
                        "Failed to initialize default log file '{}': {}",
                        default.file, e
                    ),
                }
            }
        }
    }

    layers
}

// -------- public init --------

/// Initialize logging from configuration.
/// Relative log file paths are resolved against `base_dir` (the server home dir).
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` before the subscriber goes in.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt().with_target(true).try_init();
        return;
    }

    let ansi = std::io::stdout().is_terminal();
    let layers = build_layers(cfg, base_dir, ansi);
    let _ = Registry::default().with(layers).try_init();
}

/// Subsystem → resolved log file, for diagnostics (`check` prints it).
pub fn log_file_map(cfg: &LoggingConfig, base_dir: &Path) -> HashMap<String, PathBuf> {
    cfg.iter()
        .filter(|(_, s)| !s.file.trim().is_empty())
        .map(|(name, s)| (name.clone(), resolve_log_path(&s.file, base_dir)))
        .collect()
}
