/// Logger wiring from the resolved logging configuration
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

use crate::config::LoggingConfig;

/// Writes every log line to stderr and to the log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(config: &LoggingConfig) -> io::Result<File> {
    if let Some(parent) = config.file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file_path)
}

/// Initialize the global logger
///
/// Console only logs to stderr, file only appends to `file_path`, both tee the
/// output, and neither turns logging off.
pub fn init(config: &LoggingConfig) -> io::Result<()> {
    let mut builder = Builder::new();
    builder.format_timestamp_secs();

    match (config.console, config.file) {
        (false, false) => {
            builder.filter_level(LevelFilter::Off);
        }
        (true, false) => {
            builder.filter_level(config.level).target(Target::Stderr);
        }
        (console, true) => {
            let file = open_log_file(config)?;
            let target: Box<dyn Write + Send> = if console {
                Box::new(Tee { file })
            } else {
                Box::new(file)
            };
            builder
                .filter_level(config.level)
                .target(Target::Pipe(target));
        }
    }

    // A logger may already be installed (e.g. by an embedding application)
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized, keeping existing one");
    }
    Ok(())
}
