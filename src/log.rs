//! Logging.

use std::io;
use std::io::Write;
use std::sync::OnceLock;
use log::{LevelFilter, error};
use crate::config::{Config, LogTarget};
use crate::error::Failed;
use crate::utils::date::format_local_iso_date;


//------------ Logger --------------------------------------------------------

/// Format and write log messages.
///
/// The actual work is done by a `fern` dispatcher built from the config.
pub struct Logger {
    /// The dispatcher all records are handed to.
    dispatch: Box<dyn log::Log>,
}

impl Logger {
    /// Initialize logging.
    ///
    /// All diagnostic output of certinfo is done via logging, never to
    /// stderr directly. Thus, it is important to initialize logging before
    /// doing anything else that may result in such output. This function
    /// does exactly that. It sets a maximum log level of `warn`, leading
    /// only printing important information, and directs all logging to
    /// stderr.
    pub fn init() -> Result<(), Failed> {
        log::set_max_level(LevelFilter::Warn);
        if let Err(err) = log::set_logger(&GLOBAL_LOGGER) {
            eprintln!("Failed to initialize logger: {err}.\nAborting.");
            return Err(Failed)
        }
        Ok(())
    }

    /// Switches logging to the configured target.
    ///
    /// Once the configuration has been successfully loaded, logging should
    /// be switched to whatever the user asked for via this method.
    pub fn switch_logging(config: &Config) -> Result<(), Failed> {
        let logger = Logger::new(config)?;
        GLOBAL_LOGGER.switch(logger);
        log::set_max_level(config.log_level);
        Ok(())
    }

    /// Creates a new logger from the config.
    fn new(config: &Config) -> Result<Self, Failed> {
        let dispatch = fern::Dispatch::new().level(config.log_level);
        let dispatch = match config.log_target {
            LogTarget::Stderr => {
                dispatch.format(|out, message, record| {
                    out.finish(format_args!(
                        "[{}] {}", record.level(), message
                    ))
                }).chain(io::stderr())
            }
            LogTarget::File(ref path) => {
                let file = match fern::log_file(path) {
                    Ok(file) => file,
                    Err(err) => {
                        error!(
                            "Failed to open log file '{}': {}",
                            path.display(), err
                        );
                        return Err(Failed)
                    }
                };
                dispatch.format(|out, message, record| {
                    out.finish(format_args!(
                        "[{}] [{}] {}",
                        format_local_iso_date(chrono::Local::now()),
                        record.level(),
                        message
                    ))
                }).chain(file)
            }
        };
        let (_, dispatch) = dispatch.into_log();
        Ok(Logger { dispatch })
    }
}


//------------ GlobalLogger --------------------------------------------------

/// The global logger.
///
/// A value of this type can go into a static. Until a proper logger is
/// installed, it just writes all log output to stderr.
struct GlobalLogger {
    /// The real logger. Can only be set once.
    inner: OnceLock<Logger>,
}

/// The static for the log crate.
static GLOBAL_LOGGER: GlobalLogger = GlobalLogger::new();

impl GlobalLogger {
    /// Creates a new provisional logger.
    const fn new() -> Self {
        GlobalLogger { inner: OnceLock::new() }
    }

    /// Switches to the proper logger.
    fn switch(&self, logger: Logger) {
        if self.inner.set(logger).is_err() {
            panic!("Tried to switch logger more than once.")
        }
    }
}


impl log::Log for GlobalLogger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        match self.inner.get() {
            Some(logger) => logger.dispatch.log(record),
            None => {
                let _ = writeln!(
                    io::stderr().lock(), "[{}] {}",
                    record.level(), record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Some(logger) = self.inner.get() {
            logger.dispatch.flush()
        }
    }
}


//============ Tests =========================================================
