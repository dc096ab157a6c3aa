//! Configuration.
//!
//! This module primarily contains the type [`Config`] that holds all the
//! configuration used by certinfo. It can be loaded both from a TOML
//! formatted config file and command line options.
//!
//! [`Config`]: struct.Config.html

use std::{env, fmt, fs};
use std::convert::TryFrom;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use clap::{Command, Args, ArgAction, ArgMatches, FromArgMatches, Parser};
use dirs::home_dir;
use log::{LevelFilter, error};
use crate::error::Failed;


//------------ Defaults for Some Values --------------------------------------

/// The default number of cache shards.
const DEFAULT_CACHE_SHARDS: usize = 16;

/// The default log level.
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Warn;

/// The name of the config file looked for in the home directory.
const DEFAULT_CONFIG_FILE: &str = ".certinfo.conf";


//------------ Config --------------------------------------------------------

/// Certinfo configuration.
///
/// All values are public and can be accessed directly.
///
/// The function [`config_args`] can be used to add the global arguments to
/// a clap command. Its matches can then be turned into a config via
/// [`from_arg_matches`], which also reads the config file if there is one.
/// Finally, [`to_toml`] produces a TOML value that represents the
/// current configuration.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`to_toml`]: #method.to_toml
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of independently locked shards of the dedup cache.
    pub cache_shards: usize,

    /// The maximum number of distinct certificates kept in the cache.
    ///
    /// If this is `None`, the cache is only limited by available memory.
    pub cache_max_entries: Option<usize>,

    /// The log levels to be logged.
    pub log_level: LevelFilter,

    /// The target to send log messages to.
    pub log_target: LogTarget,
}


impl Config {
    /// Adds the basic arguments to a clap command.
    ///
    /// The function follows clap’s builder pattern: it takes a command,
    /// adds a bunch of arguments to it and returns it at the end.
    pub fn config_args(app: Command) -> Command {
        GlobalArgs::augment_args(app)
    }

    /// Creates a configuration from command line matches.
    ///
    /// The function attempts to create configuration from the command line
    /// arguments provided via `matches`. It will try to read a config file
    /// if provided via the config file option (`-c` or `--config`) or a
    /// file in `$HOME/.certinfo.conf` otherwise. If the latter doesn’t
    /// exist either, starts with a default configuration.
    ///
    /// All relative paths given in command line arguments will be interpreted
    /// relative to `cur_dir`. Conversely, paths in the config file are
    /// treated as relative to the config file’s directory.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let args = GlobalArgs::from_arg_matches(
            matches
        ).expect("bug in command line arguments parser");
        let mut res = Self::create_base_config(
            args.config.as_ref().map(|path| cur_dir.join(path)).as_deref()
        )?;
        res.apply_args(args, cur_dir)?;
        Ok(res)
    }

    /// Applies the basic command line arguments to a configuration.
    ///
    /// The path arguments in `args` will be interpreted relative to
    /// `cur_dir`.
    fn apply_args(
        &mut self,
        args: GlobalArgs,
        cur_dir: &Path,
    ) -> Result<(), Failed> {
        // cache_shards
        if let Some(shards) = args.cache_shards {
            if shards == 0 {
                error!("Invalid value for --cache-shards: must be positive.");
                return Err(Failed)
            }
            self.cache_shards = shards
        }

        // cache_max_entries
        if let Some(max) = args.cache_max_entries {
            self.cache_max_entries = Some(max)
        }

        // log_level
        match (args.verbose, args.quiet) {
            // This assumes that -v and -q are conflicting.
            (0, 0) => { }
            (1, 0) => self.log_level = LevelFilter::Info,
            (2, 0) => self.log_level = LevelFilter::Debug,
            (_, 0) => self.log_level = LevelFilter::Trace,
            (0, 1) => self.log_level = LevelFilter::Error,
            (0, _) => self.log_level = LevelFilter::Off,
            _ => { }
        }

        // log_target
        if let Some(file) = args.logfile {
            if file == "-" {
                self.log_target = LogTarget::Stderr
            }
            else {
                self.log_target = LogTarget::File(cur_dir.join(file))
            }
        }

        Ok(())
    }

    /// Creates the correct base configuration for the given config file.
    ///
    /// If no config path is given, tries to read the default config in
    /// `$HOME/.certinfo.conf`. If that doesn’t exist, creates a default
    /// config.
    fn create_base_config(path: Option<&Path>) -> Result<Self, Failed> {
        let file = match path {
            Some(path) => {
                match ConfigFile::read(path)? {
                    Some(file) => file,
                    None => {
                        error!("Cannot read config file {}", path.display());
                        return Err(Failed);
                    }
                }
            }
            None => {
                match home_dir() {
                    Some(dir) => match ConfigFile::read(
                                            &dir.join(DEFAULT_CONFIG_FILE))? {
                        Some(file) => file,
                        None => return Ok(Self::default()),
                    }
                    None => return Ok(Self::default())
                }
            }
        };
        Self::from_config_file(file)
    }

    /// Creates a base config from a config file.
    fn from_config_file(mut file: ConfigFile) -> Result<Self, Failed> {
        let log_target = Self::log_target_from_config_file(&mut file)?;
        let res = Config {
            cache_shards: {
                match file.take_usize("cache-shards")? {
                    Some(0) => {
                        error!(
                            "Failed in config file {}: \
                             'cache-shards' must be positive.",
                            file.path.display()
                        );
                        return Err(Failed)
                    }
                    Some(value) => value,
                    None => DEFAULT_CACHE_SHARDS,
                }
            },
            cache_max_entries: file.take_usize("cache-max-entries")?,
            log_level: {
                file.take_from_str("log-level")?.unwrap_or(DEFAULT_LOG_LEVEL)
            },
            log_target,
        };
        file.check_exhausted()?;
        Ok(res)
    }

    /// Determines the logging target from the config file.
    fn log_target_from_config_file(
        file: &mut ConfigFile
    ) -> Result<LogTarget, Failed> {
        let log_target = file.take_string("log")?;
        let log_file = file.take_path("log-file")?;
        match log_target.as_deref() {
            Some("stderr") | None => Ok(LogTarget::Stderr),
            Some("file") => {
                match log_file {
                    Some(file) => Ok(LogTarget::File(file)),
                    None => {
                        error!(
                            "Failed in config file {}: \
                             log target \"file\" requires 'log-file' value.",
                            file.path.display()
                        );
                        Err(Failed)
                    }
                }
            }
            Some(value) => {
                error!(
                    "Failed in config file {}: \
                     invalid log target '{}'",
                    file.path.display(), value
                );
                Err(Failed)
            }
        }
    }

    /// Returns a TOML representation of the config.
    pub fn to_toml(&self) -> toml::Value {
        let mut res = toml::value::Table::new();
        res.insert(
            "cache-shards".into(),
            (self.cache_shards as i64).into()
        );
        if let Some(max) = self.cache_max_entries {
            res.insert(
                "cache-max-entries".into(),
                i64::try_from(max).unwrap_or(i64::MAX).into()
            );
        }
        res.insert(
            "log-level".into(),
            self.log_level.to_string().to_lowercase().into()
        );
        match self.log_target {
            LogTarget::Stderr => {
                res.insert("log".into(), "stderr".into());
            }
            LogTarget::File(ref file) => {
                res.insert("log".into(), "file".into());
                res.insert(
                    "log-file".into(),
                    file.display().to_string().into()
                );
            }
        }
        res.into()
    }
}


//--- Default

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_shards: DEFAULT_CACHE_SHARDS,
            cache_max_entries: None,
            log_level: DEFAULT_LOG_LEVEL,
            log_target: LogTarget::default(),
        }
    }
}


//--- Display

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_toml())
    }
}


//------------ LogTarget -----------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogTarget {
    /// Stderr.
    Stderr,

    /// A file.
    ///
    /// The argument is the file name.
    File(PathBuf)
}


//--- Default

impl Default for LogTarget {
    fn default() -> Self {
        LogTarget::Stderr
    }
}


//------------ GlobalArgs ----------------------------------------------------

/// The global command line arguments.
#[derive(Clone, Debug, Parser)]
struct GlobalArgs {
    /// Read base configuration from this file
    #[arg(short, long, value_name="PATH")]
    config: Option<PathBuf>,

    /// Number of independently locked cache shards
    #[arg(long, value_name = "COUNT")]
    cache_shards: Option<usize>,

    /// Maximum number of distinct certificates kept in the cache
    #[arg(long, value_name = "COUNT")]
    cache_max_entries: Option<usize>,

    /// Log more information, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log less information, twice for no information
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Log to this file
    #[arg(long, value_name = "PATH")]
    logfile: Option<String>,
}


//------------ ConfigFile ----------------------------------------------------

/// The content of a config file.
///
/// This is a thin wrapper around `toml::Table` to make dealing with it more
/// convenient.
#[derive(Clone, Debug)]
struct ConfigFile {
    /// The content of the file.
    content: toml::value::Table,

    /// The path to the config file.
    path: PathBuf,

    /// The directory we found the file in.
    ///
    /// This is used in relative paths.
    dir: PathBuf,
}

impl ConfigFile {
    /// Reads the config file at the given path.
    ///
    /// If there is no such file, returns `None`. If there is a file but it
    /// is broken, aborts.
    fn read(path: &Path) -> Result<Option<Self>, Failed> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(_) => return Ok(None)
        };
        let mut config = String::new();
        if let Err(err) = file.read_to_string(&mut config) {
            error!(
                "Failed to read config file {}: {}",
                path.display(), err
            );
            return Err(Failed);
        }
        Self::parse(&config, path).map(Some)
    }

    /// Parses the content of the file from a string.
    fn parse(content: &str, path: &Path) -> Result<Self, Failed> {
        let content = match toml::from_str(content) {
            Ok(toml::Value::Table(content)) => content,
            Ok(_) => {
                error!(
                    "Failed to parse config file {}: Not a mapping.",
                    path.display()
                );
                return Err(Failed);
            }
            Err(err) => {
                error!(
                    "Failed to parse config file {}: {}",
                    path.display(), err
                );
                return Err(Failed);
            }
        };
        let path = if path.is_relative() {
            match env::current_dir() {
                Ok(dir) => dir.join(path),
                Err(err) => {
                    error!(
                        "Fatal: Can't determine current directory: {}.",
                        err
                    );
                    return Err(Failed);
                }
            }
        }
        else {
            path.into()
        };
        let dir = path.parent().map(Into::into).unwrap_or_default();
        Ok(ConfigFile { content, path, dir })
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is negative.
    fn take_usize(&mut self, key: &str) -> Result<Option<usize>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::Integer(res) = value {
                    usize::try_from(res).map(Some).map_err(|_| {
                        error!(
                            "Failed in config file {}: \
                            '{}' expected to be a positive integer.",
                            self.path.display(), key
                        );
                        Failed
                    })
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be an integer.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a string value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t a string.
    fn take_string(&mut self, key: &str) -> Result<Option<String>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::String(res) = value {
                    Ok(Some(res))
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be a string.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a string encoded value from the config file.
    ///
    /// The value is taken from the given `key`. It is expected to be a
    /// string and will be converted to the final type via `FromStr::from_str`.
    ///
    /// Returns `Ok(None)` if the key doesn’t exist. Returns an error if the
    /// key exists but the value isn’t a string or conversion fails.
    fn take_from_str<T>(&mut self, key: &str) -> Result<Option<T>, Failed>
    where T: FromStr, T::Err: fmt::Display {
        match self.take_string(key)? {
            Some(value) => {
                match T::from_str(&value) {
                    Ok(some) => Ok(Some(some)),
                    Err(err) => {
                        error!(
                            "Failed in config file {}: \
                             illegal value in '{}': {}.",
                            self.path.display(), key, err
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a path value from the config file.
    ///
    /// The path is taken from the given `key`. It must be a string value.
    /// It is treated as relative to the directory of the config file. If it
    /// is indeed a relative path, it is expanded accordingly and an absolute
    /// path will be returned.
    ///
    /// Returns `Ok(None)` if the key does not exist. Returns an error if the
    /// key exists but the value isn’t a string.
    fn take_path(&mut self, key: &str) -> Result<Option<PathBuf>, Failed> {
        self.take_string(key).map(|opt| opt.map(|path| self.dir.join(path)))
    }

    /// Checks whether the config file is now empty.
    ///
    /// If it isn’t, logs a complaint and returns an error.
    fn check_exhausted(&self) -> Result<(), Failed> {
        if !self.content.is_empty() {
            error!(
                "Failed in config file {}: Unknown settings {}.",
                self.path.display(),
                self.content.keys().map(String::as_str)
                    .collect::<Vec<_>>().join(",")
            );
            Err(Failed)
        }
        else {
            Ok(())
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn process_basic_args(args: &[&str]) -> Config {
        let args = GlobalArgs::from_arg_matches(
            &Config::config_args(Command::new("certinfo"))
                .get_matches_from(args)
        ).unwrap();
        let mut config = Config::default();
        config.apply_args(args, Path::new("/test")).unwrap();
        config
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.cache_shards, DEFAULT_CACHE_SHARDS);
        assert_eq!(config.cache_max_entries, None);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.log_target, LogTarget::Stderr);
    }

    #[test]
    #[cfg(unix)] // ... because of drive letters in absolute paths on Windows.
    fn good_config_file() {
        let config = ConfigFile::parse(
            "cache-shards = 4\n\
             cache-max-entries = 100000\n\
             log-level = \"info\"\n\
             log = \"file\"\n\
             log-file = \"foo.log\"",
            Path::new("/test/certinfo.conf")
        ).unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config.cache_shards, 4);
        assert_eq!(config.cache_max_entries, Some(100000));
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/test/foo.log"))
        );
    }

    #[test]
    fn minimal_config_file() {
        let config = ConfigFile::parse(
            "", Path::new("/test/certinfo.conf")
        ).unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn bad_config_file() {
        let config = ConfigFile::parse(
            "cache-shards = 0", Path::new("/test/certinfo.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "cache-max-entries = -5", Path::new("/test/certinfo.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "log = \"file\"", Path::new("/test/certinfo.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "log-level = \"loud\"", Path::new("/test/certinfo.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "repository-dir = \"/repo\"", Path::new("/test/certinfo.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        assert!(
            ConfigFile::parse(
                "cache-shards = ", Path::new("/test/certinfo.conf")
            ).is_err()
        );
    }

    #[test]
    #[cfg(unix)]
    fn read_your_own_config() {
        let mut out_config = Config::default();
        out_config.cache_max_entries = Some(12);
        out_config.log_level = LevelFilter::Debug;
        out_config.log_target = LogTarget::File("/var/log/certinfo".into());
        let out_file = format!("{}", out_config.to_toml());
        let in_file = ConfigFile::parse(
            &out_file, Path::new("/test/certinfo.conf")
        ).unwrap();
        let in_config = Config::from_config_file(in_file).unwrap();
        assert_eq!(in_config, out_config);
    }

    #[test]
    fn basic_args() {
        let config = process_basic_args(&[
            "certinfo", "--cache-shards", "2", "--cache-max-entries", "50",
            "--logfile", "certinfo.log",
        ]);
        assert_eq!(config.cache_shards, 2);
        assert_eq!(config.cache_max_entries, Some(50));
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/test/certinfo.log"))
        );

        let config = process_basic_args(&["certinfo", "--logfile", "-"]);
        assert_eq!(config.log_target, LogTarget::Stderr);
    }

    #[test]
    fn zero_shards_on_command_line() {
        let args = GlobalArgs::from_arg_matches(
            &Config::config_args(Command::new("certinfo"))
                .get_matches_from(["certinfo", "--cache-shards", "0"])
        ).unwrap();
        let mut config = Config::default();
        assert!(config.apply_args(args, Path::new("/test")).is_err());
    }

    #[test]
    fn verbosity() {
        assert_eq!(
            process_basic_args(&["certinfo"]).log_level,
            LevelFilter::Warn
        );
        assert_eq!(
            process_basic_args(&["certinfo", "-v"]).log_level,
            LevelFilter::Info
        );
        assert_eq!(
            process_basic_args(&["certinfo", "-vv"]).log_level,
            LevelFilter::Debug
        );
        assert_eq!(
            process_basic_args(&["certinfo", "-vvv"]).log_level,
            LevelFilter::Trace
        );
        assert_eq!(
            process_basic_args(&["certinfo", "-q"]).log_level,
            LevelFilter::Error
        );
        assert_eq!(
            process_basic_args(&["certinfo", "-qq"]).log_level,
            LevelFilter::Off
        );
    }
}
