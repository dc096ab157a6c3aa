//! What certinfo can do for you.
//!
//! This module implements all the commands users can ask certinfo to
//! perform. They are encapsulated in the type [`Operation`] which can
//! determine the command from the command line argumments and then execute
//! it.
//!
//! [`Operation`]: enum.Operation.html

use std::{fs, io};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use bytes::Bytes;
use clap::{Args, ArgMatches, FromArgMatches, Parser};
use crossbeam_queue::SegQueue;
use crossbeam_utils::thread;
use log::{error, info, warn};
use crate::cache::{CertCache, CertError, CertRef};
use crate::cert::DecodeStatus;
use crate::config::Config;
use crate::error::{ExitError, Failed};
use crate::handshake::{CertificateList, CertificateMessages};
use crate::log::Logger;
use crate::output::{FieldWriter, JsonWriter, SessionTime, save_fields};
use crate::utils::date::{epoch_to_utc, format_iso_date};


//------------ Operation -----------------------------------------------------

/// The command to execute.
///
/// This type collects all the commands we have defined plus any possible
/// extra configuration they support.
///
/// You can create a value from the command line arguments. First, you add
/// all necessary sub-commands and arguments to a clap `Command` via
/// [`config_args`] and then process the argument matches into a value in
/// [`from_arg_matches`]. Finally, you can execute the created command
/// through the [`run`] method.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`run`]: #method.run
pub enum Operation {
    Decode(Decode),
    PrintConfig(PrintConfig),
}

impl Operation {
    /// Prepares everything.
    ///
    /// Call this before doing anything else.
    pub fn prepare() -> Result<(), Failed> {
        Logger::init()
    }

    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        let app = Decode::config_args(app);
        PrintConfig::config_args(app)
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        Ok(match matches.subcommand() {
            Some(("decode", matches)) => {
                Operation::Decode(Decode::from_arg_matches(matches, cur_dir)?)
            }
            Some(("config", _)) => {
                Operation::PrintConfig(PrintConfig)
            }
            _ => {
                error!(
                    "Failed: a command is required.\n\
                     \nCommands are:\
                     \n   decode    Decodes certificates and prints their \
                                    fields\
                     \n   config    Prints the current config\
                     \n\
                     \nSee certinfo -h for a usage summary."
                );
                return Err(Failed)
            }
        })
    }

    /// Runs the command.
    ///
    /// Switches logging to the configured target first.
    pub fn run(self, config: Config) -> Result<(), ExitError> {
        Logger::switch_logging(&config)?;
        match self {
            Operation::Decode(cmd) => cmd.run(&config),
            Operation::PrintConfig(cmd) => cmd.run(&config),
        }
    }
}


//------------ Decode --------------------------------------------------------

/// Decode certificates and print their fields.
pub struct Decode {
    /// The files to read.
    files: Vec<PathBuf>,

    /// How the certificates are stored in the files.
    format: InputFormat,

    /// The time to compare validity against.
    time: SessionTime,

    /// Print cache statistics after the certificates.
    stats: bool,

    /// The number of worker threads.
    threads: usize,
}

/// How certificates are stored in a file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InputFormat {
    /// A single DER encoded certificate.
    Der,

    /// Any number of PEM encoded certificates.
    Pem,

    /// The body of a TLS Certificate handshake message.
    Handshake,

    /// A stream of TLS records.
    Records,
}

/// The command line arguments for the decode sub-command.
#[derive(Clone, Debug, Parser)]
struct DecodeArgs {
    /// The files contain PEM encoded certificates
    #[arg(long, conflicts_with_all = ["handshake", "records"])]
    pem: bool,

    /// The files contain TLS Certificate handshake message bodies
    #[arg(long, conflicts_with = "records")]
    handshake: bool,

    /// The files contain captured TLS records
    #[arg(long)]
    records: bool,

    /// Time to compare validity against in seconds since the epoch
    #[arg(long, value_name = "EPOCH")]
    time: Option<i64>,

    /// Print cache statistics after the certificates
    #[arg(long)]
    stats: bool,

    /// Number of threads for decoding
    #[arg(long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Files to read certificates from
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

impl Decode {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            DecodeArgs::augment_args(
                clap::Command::new("decode")
                    .about("Decodes certificates and prints their fields")
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches, cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let args = DecodeArgs::from_arg_matches(
            matches
        ).expect("bug in command line arguments parser");
        Ok(Decode {
            files: args.files.into_iter().map(|path| {
                cur_dir.join(path)
            }).collect(),
            format: if args.pem {
                InputFormat::Pem
            }
            else if args.handshake {
                InputFormat::Handshake
            }
            else if args.records {
                InputFormat::Records
            }
            else {
                InputFormat::Der
            },
            time: match args.time {
                Some(time) => SessionTime::from_epoch(time),
                None => SessionTime::now(),
            },
            stats: args.stats,
            threads: match args.threads {
                Some(0) => {
                    error!("Invalid value for --threads: must be positive.");
                    return Err(Failed)
                }
                Some(threads) => threads,
                None => ::num_cpus::get(),
            }
        })
    }

    /// Decodes all certificates and prints them to stdout.
    fn run(self, config: &Config) -> Result<(), ExitError> {
        if let Some(time) = epoch_to_utc(self.time.epoch()) {
            info!("Remaining validity relative to {}.", format_iso_date(time));
        }
        let inputs = self.read_inputs()?;
        let cache = CertCache::new(config);
        let results = self.decode_inputs(&cache, inputs)?;

        let mut partial = 0;
        let mut failed = 0;
        for item in &results {
            match item.result {
                Ok((_, DecodeStatus::Partial)) => partial += 1,
                Ok(_) => { }
                Err(_) => failed += 1,
            }
        }

        let out = io::stdout();
        let mut writer = JsonWriter::new(out.lock());
        if let Err(err) = self.output(&results, &cache, &mut writer) {
            // Surpress an error message for broken pipe on stdout.
            if err.kind() != io::ErrorKind::BrokenPipe {
                error!("Failed to output result: {}", err);
                return Err(ExitError::Generic)
            }
        }
        info!(
            "Decoded {} certificates ({} partial, {} failed). Cache: {}.",
            results.len(), partial, failed, cache.metrics()
        );

        // Let go of all references. The cache is empty afterwards.
        drop(results);
        debug_assert!(cache.is_empty());

        if failed > 0 {
            Err(ExitError::Undecodable)
        }
        else {
            Ok(())
        }
    }

    /// Reads all files and splits them into certificates.
    fn read_inputs(&self) -> Result<Vec<Input>, Failed> {
        let mut res = Vec::new();
        for (file, path) in self.files.iter().enumerate() {
            let data = match fs::read(path) {
                Ok(data) => Bytes::from(data),
                Err(err) => {
                    error!(
                        "Failed to read input file '{}': {}",
                        path.display(), err
                    );
                    return Err(Failed)
                }
            };
            let certs = match self.format {
                InputFormat::Der => vec![data],
                InputFormat::Pem => pem_certificates(&data, path)?,
                InputFormat::Handshake => {
                    CertificateList::new(data).collect()
                }
                InputFormat::Records => {
                    CertificateMessages::new(data).flat_map(
                        CertificateList::new
                    ).collect()
                }
            };
            if certs.is_empty() {
                info!("No certificates in file '{}'.", path.display());
            }
            res.extend(certs.into_iter().enumerate().map(|(index, data)| {
                Input { file, index, data }
            }));
        }
        Ok(res)
    }

    /// Decodes and interns all inputs using a pool of worker threads.
    ///
    /// Returns the results in the order of the inputs.
    fn decode_inputs(
        &self, cache: &CertCache, inputs: Vec<Input>,
    ) -> Result<Vec<Decoded>, Failed> {
        let count = inputs.len();
        let tasks = SegQueue::new();
        for (pos, input) in inputs.into_iter().enumerate() {
            tasks.push((pos, input));
        }
        let done = SegQueue::new();

        let res = thread::scope(|scope| {
            for _ in 0..self.threads.min(count) {
                scope.spawn(|_| {
                    while let Some((pos, input)) = tasks.pop() {
                        let result = cache.decode_certificate(input.data);
                        done.push((pos, Decoded {
                            file: input.file,
                            index: input.index,
                            result
                        }));
                    }
                });
            }
        });
        if res.is_err() {
            error!(
                "Decoding failed after a worker thread has panicked. \
                 This is most assuredly a bug."
            );
            return Err(Failed)
        }

        let mut res = Vec::with_capacity(count);
        while let Some(item) = done.pop() {
            res.push(item)
        }
        res.sort_unstable_by_key(|item| item.0);
        Ok(res.into_iter().map(|item| item.1).collect())
    }

    /// Writes one JSON object per decoded certificate.
    fn output<W: FieldWriter>(
        &self,
        results: &[Decoded],
        cache: &CertCache,
        writer: &mut W,
    ) -> Result<(), io::Error> {
        for item in results {
            let path = self.files[item.file].display().to_string();
            let (cert, status) = match item.result {
                Ok((ref cert, status)) => (cert, status),
                Err(ref err) => {
                    info!(
                        "{}: certificate {}: {}", path, item.index, err
                    );
                    continue
                }
            };
            writer.begin_object(None)?;
            writer.write_str("file", &path)?;
            writer.write_int("index", item.index as i64)?;
            writer.write_str("status", match status {
                DecodeStatus::Complete => "complete",
                DecodeStatus::Partial => "partial",
            })?;
            if cert.is_self_signed() {
                writer.write_str_array(
                    "tags", &[Cow::Borrowed("cert:self-signed")]
                )?;
            }
            writer.begin_object(Some("cert"))?;
            save_fields(writer, cert, self.time)?;
            writer.end_object()?;
            writer.end_object()?;
        }
        if self.stats {
            let stats = cache.metrics();
            writer.begin_object(None)?;
            writer.begin_object(Some("stats"))?;
            writer.write_int("entries", stats.entries as i64)?;
            writer.write_int("hits", stats.hits as i64)?;
            writer.write_int("misses", stats.misses as i64)?;
            writer.write_int("removals", stats.removals as i64)?;
            writer.write_int("rejected", stats.rejected as i64)?;
            writer.end_object()?;
            writer.end_object()?;
        }
        Ok(())
    }
}

/// A certificate to decode.
struct Input {
    /// The index of the file in the file list.
    file: usize,

    /// The index of the certificate within the file.
    index: usize,

    /// The raw certificate.
    data: Bytes,
}

/// The result of decoding an input.
struct Decoded {
    file: usize,
    index: usize,
    result: Result<(CertRef, DecodeStatus), CertError>,
}


//------------ PrintConfig ---------------------------------------------------

/// Shows the current configuration.
pub struct PrintConfig;

impl PrintConfig {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(clap::Command::new("config")
            .about("Prints the current config and exits")
        )
    }

    /// Prints the current configuration to stdout and exits.
    fn run(self, config: &Config) -> Result<(), ExitError> {
        println!("{}", config);
        Ok(())
    }
}


//------------ Helper Functions ----------------------------------------------

/// Certificate labels used by older tools and their current form.
const LEGACY_PEM_LABELS: [(&[u8], &[u8]); 2] = [
    (b"-----BEGIN X509 CERTIFICATE-----", b"-----BEGIN CERTIFICATE-----"),
    (b"-----END X509 CERTIFICATE-----", b"-----END CERTIFICATE-----"),
];

/// Extracts all PEM encoded certificates from a file’s content.
///
/// Anything outside of the certificate blocks is ignored. Blocks that
/// fail to decode are logged and skipped.
fn pem_certificates(data: &[u8], path: &Path) -> Result<Vec<Bytes>, Failed> {
    let data = normalize_pem_labels(data);
    let mut reader = data.as_slice();
    let mut res = Vec::new();
    loop {
        let remaining = reader.len();
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(rustls_pemfile::Item::X509Certificate(cert))) => {
                res.push(cert.into())
            }
            Ok(Some(_)) => { }
            Ok(None) => break,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(
                    "File '{}': skipping invalid PEM block: {}",
                    path.display(), err
                );
                if reader.len() == remaining {
                    break
                }
            }
            Err(err) => {
                error!(
                    "Failed to read PEM file '{}': {}", path.display(), err
                );
                return Err(Failed)
            }
        }
    }
    Ok(res)
}

/// Rewrites legacy certificate labels into the standard ones.
fn normalize_pem_labels(data: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(data.len());
    for line in data.split_inclusive(|&ch| ch == b'\n') {
        let legacy = LEGACY_PEM_LABELS.iter().find(|(old, _)| {
            line.starts_with(old)
        });
        match legacy {
            Some(&(old, new)) => {
                res.extend_from_slice(new);
                res.extend_from_slice(&line[old.len()..]);
            }
            None => res.extend_from_slice(line)
        }
    }
    res
}


//============ Tests =========================================================
