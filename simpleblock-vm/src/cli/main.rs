use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use log::{info, warn};
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::macros::format_description;

use simpleblock_utils::{hexcode, hexprint};
use simpleblock_vm::{Disk, DiskConfig, Geometry};
use simpleblock_vm::driver::GuestDriver;
use simpleblock_vm::import::{ImageImport, ImageInbox};
use simpleblock_vm::persist::{DirMap, PersistentMap, DEFAULT_QUOTA};
use simpleblock_vm::storage::{BackendKind, StorageBackend};

const STORE_PATH: &str = "STORE_PATH";
const BACKEND: &str = "BACKEND";
const SECTOR_COUNT: &str = "SECTOR_COUNT";
const SECTOR_SIZE: &str = "SECTOR_SIZE";
const LOG_PATH: &str = "LOG_PATH";
const LOG_LEVEL: &str = "LOG_LEVEL";

const SECTOR: &str = "SECTOR";
const OFFSET: &str = "OFFSET";
const COUNT: &str = "COUNT";
const HEX: &str = "HEX";
const FILE: &str = "FILE";
const LINK: &str = "LINK";
const DIR: &str = "DIR";

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
}

/// Storage backends selectable from the command line.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum Backend {
    Memory,
    Hex,
    Words,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => BackendKind::Memory,
            Backend::Hex => BackendKind::Hex,
            Backend::Words => BackendKind::Words,
        }
    }
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .subcommand_required(true)
        .after_help("\
Every read and write goes through the same port protocol a guest kernel \
uses, so this is also a way to exercise the controller. Without --store, \
the disk only lives for the duration of the command.")
        .arg(Arg::new(STORE_PATH)
            .help("The directory holding the persistent store.")
            .short('s')
            .long("store")
            .global(true)
            .action(ArgAction::Set)
            .value_parser(value_parser!(PathBuf)))
        .arg(Arg::new(BACKEND)
            .help("The storage backend to use. Case insensitive.")
            .short('b')
            .long("backend")
            .global(true)
            .action(ArgAction::Set)
            .default_value("hex")
            .value_parser(value_parser!(Backend))
            .ignore_case(true))
        .arg(Arg::new(SECTOR_COUNT)
            .help("The number of sectors on the disk.")
            .long("sectors")
            .global(true)
            .action(ArgAction::Set)
            .default_value("2048")
            .value_parser(value_parser!(u32).range(1..=0x10000)))
        .arg(Arg::new(SECTOR_SIZE)
            .help("The size of each sector in bytes.")
            .long("sector-size")
            .global(true)
            .action(ArgAction::Set)
            .default_value("512")
            .value_parser(value_parser!(u32).range(1..=0x10000)))
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .global(true)
            .action(ArgAction::Set))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .global(true)
            .action(ArgAction::Set)
            .default_value("trace")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true))
        .subcommand(Command::new("info")
            .about("Show the disk geometry, backend, and store usage."))
        .subcommand(Command::new("read")
            .about("Hex dump sectors.")
            .arg(Arg::new(SECTOR)
                .help("The first sector to read.")
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(COUNT)
                .help("How many sectors to read.")
                .short('n')
                .long("count")
                .action(ArgAction::Set)
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..))))
        .subcommand(Command::new("write")
            .about("Write bytes, given as a hex string, at a sector and offset.")
            .arg(Arg::new(SECTOR)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(OFFSET)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(HEX)
                .required(true)))
        .subcommand(Command::new("import")
            .about("Replace the disk contents with a raw image. \
                    The image must be exactly the size of the disk.")
            .arg(Arg::new(FILE)
                .required(true)
                .value_parser(value_parser!(PathBuf))))
        .subcommand(Command::new("export")
            .about("Save the disk contents as a raw image.")
            .arg(Arg::new(FILE)
                .required(true)
                .value_parser(value_parser!(PathBuf)))
            .arg(Arg::new(LINK)
                .help("Write a base64 data: link instead of raw bytes.")
                .long("link")
                .action(ArgAction::SetTrue)))
        .subcommand(Command::new("clear")
            .about("Zero the whole disk."))
        .subcommand(Command::new("watch")
            .about("Import every image that appears in a directory, until killed.")
            .arg(Arg::new(DIR)
                .required(true)
                .value_parser(value_parser!(PathBuf))))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .add_filter_ignore_str("notify")
        .add_filter_ignore_str("mio")
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

/// Write a file in one go, so a failure never leaves it half-written.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), String> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let result = NamedTempFile::new_in(dir)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.persist(path).map_err(|e| e.error)?;
            Ok(())
        });
    result.map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            match File::create(log_path) {
                Ok(logfile) => {
                    let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                        LogLevel::TRACE => LevelFilter::Trace,
                        LogLevel::DEBUG => LevelFilter::Debug,
                        LogLevel::INFO => LevelFilter::Info,
                    };
                    init_logging(logfile, level)?;
                },
                Err(e) => return Err(
                    format!("Failed to create log file: {}", e)),
            }
        }

        // Build the configuration.
        let geometry = Geometry::new(*args.get_one::<u32>(SECTOR_COUNT).unwrap(),
                                     *args.get_one::<u32>(SECTOR_SIZE).unwrap())
            .map_err(|e| e.to_string())?;
        let config = DiskConfig {
            geometry,
            backend: (*args.get_one::<Backend>(BACKEND).unwrap()).into(),
            ..DiskConfig::default()
        };

        // Open the store and the disk.
        let store_path = args.get_one::<PathBuf>(STORE_PATH);
        let store = match store_path {
            Some(path) => {
                let map = DirMap::open(path, DEFAULT_QUOTA)
                    .map_err(|e| format!("Failed to open store '{}': {}", path.display(), e))?;
                Some(Box::new(map) as Box<dyn PersistentMap>)
            }
            None => None,
        };
        let mut disk = config.open(store).map_err(|e| e.to_string())?;
        if let Some(warning) = &disk.warning {
            eprintln!("Warning: {}; falling back to an in-memory disk.", warning);
        }

        match args.subcommand() {
            Some(("info", _)) => info_command(&disk, store_path)?,
            Some(("read", sub)) => {
                let sector = *sub.get_one::<u32>(SECTOR).unwrap();
                let count = *sub.get_one::<u32>(COUNT).unwrap();
                let sector_size = geometry.sector_size() as usize;
                let buf = GuestDriver::new(&mut disk.ports)
                    .read_sectors(sector, count)
                    .map_err(|e| format!("Read failed: {}", e))?;
                print!("{}", hexprint::hex_dump(&buf, sector as usize * sector_size));
            }
            Some(("write", sub)) => {
                let sector = *sub.get_one::<u32>(SECTOR).unwrap();
                let offset = *sub.get_one::<u32>(OFFSET).unwrap();
                let hex = sub.get_one::<String>(HEX).unwrap();
                let bytes = hexcode::decode_bytes(hex, hex.len() / 2)
                    .ok_or_else(|| format!("'{}' is not a valid hex string.", hex))?;
                write_command(&mut disk, geometry, sector, offset, &bytes)?;
            }
            Some(("import", sub)) => {
                let path = sub.get_one::<PathBuf>(FILE).unwrap();
                let image = ImageImport::spawn(path).wait()
                    .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
                backend(&mut disk).load_data(&image)
                    .map_err(|e| format!("Import failed: {}", e))?;
                info!("Imported '{}'.", path.display());
            }
            Some(("export", sub)) => {
                let path = sub.get_one::<PathBuf>(FILE).unwrap();
                let storage = backend(&mut disk);
                let contents = if sub.get_flag(LINK) {
                    storage.download_link().into_bytes()
                } else {
                    storage.export_image()
                };
                write_atomically(path, &contents)?;
                info!("Exported to '{}'.", path.display());
            }
            Some(("clear", _)) => {
                backend(&mut disk).clear_disk()
                    .map_err(|e| format!("Clear failed: {}", e))?;
            }
            Some(("watch", sub)) => {
                let dir = sub.get_one::<PathBuf>(DIR).unwrap();
                watch_command(&mut disk, dir)?;
            }
            _ => unreachable!(),
        }

        backend(&mut disk).sync().map_err(|e| format!("Failed to sync disk: {}", e))
    }
}

fn backend(disk: &mut Disk) -> &mut Box<dyn StorageBackend> {
    disk.ports.controller_mut().backend_mut()
}

fn info_command(disk: &Disk, store_path: Option<&PathBuf>) -> Result<(), String> {
    let backend = disk.ports.controller().backend();
    let geometry = backend.geometry();
    println!("Geometry: {} sectors of {} bytes ({} bytes)",
             geometry.sector_count(), geometry.sector_size(), geometry.image_len());
    let kind = backend.kind();
    println!("Backend:  {} ({})", kind,
             if kind.is_persistent() { "persistent" } else { "lost on exit" });
    println!("Ports:    {:#06X}", disk.ports.base());
    if let Some(path) = store_path {
        // Reopening recomputes usage from what is actually on disk.
        let store = DirMap::open(path, DEFAULT_QUOTA).map_err(|e| e.to_string())?;
        println!("Store:    '{}', {} of {} bytes used",
                 path.display(), store.usage(), store.quota());
    }
    Ok(())
}

fn write_command(disk: &mut Disk, geometry: Geometry,
                 sector: u32, offset: u32, bytes: &[u8]) -> Result<(), String> {
    // Writes run on across sector boundaries.
    let sector_size = geometry.sector_size() as u64;
    let start = sector as u64 * sector_size + offset as u64;
    let mut driver = GuestDriver::new(&mut disk.ports);
    for (address, value) in (start..).zip(bytes) {
        let sector = (address / sector_size) as u32;
        let byte = (address % sector_size) as u32;
        driver.write_byte(sector, byte, *value)
            .map_err(|e| format!("Write failed: {}", e))?;
    }
    info!("Wrote {} bytes at sector {} offset {}.", bytes.len(), sector, offset);
    Ok(())
}

fn watch_command(disk: &mut Disk, dir: &Path) -> Result<(), String> {
    let inbox = ImageInbox::start(dir)
        .map_err(|e| format!("Failed to watch '{}': {}", dir.display(), e))?;
    println!("Watching '{}' for images. Press Ctrl+C to stop.", dir.display());

    while let Some(delivery) = inbox.recv() {
        let path = delivery.path.display();
        let result = delivery.result
            .and_then(|image| backend(disk).load_data(&image));
        match result {
            Ok(()) => println!("Imported '{}'.", path),
            Err(e) => {
                warn!("Rejected '{}': {}", path, e);
                eprintln!("Rejected '{}': {}", path, e);
            }
        }
    }
    Err("The directory watcher stopped unexpectedly.".into())
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}
