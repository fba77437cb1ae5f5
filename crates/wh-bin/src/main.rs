//! Whittle entrypoint: parse the command line, load the input, run the
//! selected reduction engine, and write the minimal test case.

mod options;
mod source;
mod subprocess;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use core_cache::{CachePolicy, OutcomeCache, SharedCache};
use core_engine::{LimitReduction, ParallelReducer, Reducer, StopCondition};
use core_model::{ConfigId, FailureKind, IdTag, TestBuilder};
use core_strategy::{CombinedIterator, SplitFactor, iterator, splitter};

use options::FileConfig;
use source::AtomKind;
use subprocess::{ConcatTestBuilder, SubprocessTest};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "whittle",
    version,
    about = "Minimizes failing test cases with parallel Delta Debugging"
)]
struct Args {
    /// Test case to be reduced.
    #[arg(short = 'i', long, value_name = "FILE")]
    input: PathBuf,

    /// Script deciding interestingness: exit code 0 keeps the candidate.
    #[arg(long, value_name = "FILE")]
    test: PathBuf,

    /// Cache strategy (none, config, content, content-hash).
    #[arg(long, value_name = "NAME")]
    cache: Option<String>,

    /// Split algorithm (zeller, balanced).
    #[arg(long, value_name = "NAME")]
    split: Option<String>,

    /// Initial granularity and split factor (integer >= 2, or "max").
    #[arg(long, value_name = "N")]
    granularity: Option<SplitFactor>,

    /// Ordering strategy for subset checks.
    #[arg(long, value_name = "NAME")]
    subset_iterator: Option<String>,

    /// Ordering strategy for complement checks.
    #[arg(long, value_name = "NAME")]
    complement_iterator: Option<String>,

    /// Check complements before subsets.
    #[arg(long)]
    complement_first: bool,

    /// Run tests in parallel.
    #[arg(short = 'p', long)]
    parallel: bool,

    /// Maximum number of test commands to run in parallel.
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Hold back parallel dispatch above this CPU utilization percent.
    #[arg(long, value_name = "PCT")]
    max_utilization: Option<f32>,

    /// Store failing test cases in the cache too.
    #[arg(long)]
    cache_fail: bool,

    /// Keep larger cached entries when a failing test case is found.
    #[arg(long = "no-cache-evict-after-fail", action = ArgAction::SetFalse)]
    evict_after_fail: bool,

    /// Run the ddmin algorithm only once instead of to a fixed point.
    #[arg(long = "no-dd-star", action = ArgAction::SetFalse)]
    dd_star: bool,

    /// Limit the execution time of the reduction, in seconds.
    #[arg(long, value_name = "SEC")]
    limit_time: Option<u64>,

    /// Limit the number of test command executions.
    #[arg(long, value_name = "N")]
    limit_tests: Option<usize>,

    /// Atom (granularity) of the input.
    #[arg(short = 'a', long, value_enum)]
    atom: Option<AtomKind>,

    /// Working directory (default: <input>.<timestamp>).
    #[arg(short = 'o', long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Keep the generated temporary files.
    #[arg(long = "no-cleanup", action = ArgAction::SetFalse)]
    cleanup: bool,

    /// Configuration file (default: ./whittle.toml when present).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Effective reduction settings: file defaults under CLI overrides.
#[derive(Debug)]
struct Settings {
    cache: String,
    split: String,
    granularity: SplitFactor,
    subset_iterator: String,
    complement_iterator: String,
    parallel: bool,
    jobs: Option<usize>,
    policy: CachePolicy,
    atom: AtomKind,
}

fn resolve(args: &Args, file: FileConfig) -> Result<Settings> {
    let defaults = file.reduce;
    let granularity = match args.granularity {
        Some(factor) => factor,
        None => match defaults.granularity {
            Some(value) => value.to_factor()?,
            None => SplitFactor::default(),
        },
    };
    let atom = match args.atom {
        Some(kind) => kind,
        None => match defaults.atom.as_deref() {
            Some(name) => name.parse().map_err(|e: String| anyhow!(e))?,
            None => AtomKind::Line,
        },
    };
    Ok(Settings {
        cache: args
            .cache
            .clone()
            .or(defaults.cache)
            .unwrap_or_else(|| "config".into()),
        split: args
            .split
            .clone()
            .or(defaults.split)
            .unwrap_or_else(|| "zeller".into()),
        granularity,
        subset_iterator: args
            .subset_iterator
            .clone()
            .or(defaults.subset_iterator)
            .unwrap_or_else(|| "forward".into()),
        complement_iterator: args
            .complement_iterator
            .clone()
            .or(defaults.complement_iterator)
            .unwrap_or_else(|| "forward".into()),
        parallel: args.parallel || defaults.parallel.unwrap_or(false),
        jobs: args.jobs.or(defaults.jobs),
        policy: CachePolicy {
            cache_fail: args.cache_fail,
            evict_after_fail: args.evict_after_fail,
        },
        atom,
    })
}

/// One stop condition shared by the line and char phases, so a test
/// budget spans the whole session.
#[derive(Clone)]
struct SharedLimit(Arc<Mutex<LimitReduction>>);

impl SharedLimit {
    fn new(limit: LimitReduction) -> Self {
        Self(Arc::new(Mutex::new(limit)))
    }
}

impl StopCondition for SharedLimit {
    fn check(&mut self) -> Result<(), String> {
        self.0.lock().expect("limit lock poisoned").check()
    }
}

fn make_stop(args: &Args) -> Option<SharedLimit> {
    if args.limit_time.is_none() && args.limit_tests.is_none() {
        return None;
    }
    let deadline = args
        .limit_time
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    Some(SharedLimit::new(LimitReduction::new(
        deadline,
        args.limit_tests,
    )))
}

fn configure_logging(level: &str, out_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_appender = tracing_appender::rolling::never(out_dir, "whittle.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file_writer.and(std::io::stderr))
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_err) => {
            // Global subscriber already installed; drop the guard so the
            // file writer shuts down.
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "reduce.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn default_out_dir(input: &Path) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("{}.{stamp}", input.display()))
}

fn finalize(
    out_dir: &Path,
    tests_dir: &Path,
    filename: &str,
    content: &str,
    cleanup: bool,
) -> Result<()> {
    if cleanup {
        let _ = std::fs::remove_dir_all(tests_dir);
    }
    source::write_output(out_dir, filename, content)?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let file = options::load(args.config.clone())?;
    let settings = resolve(&args, file)?;

    let input = args
        .input
        .canonicalize()
        .with_context(|| format!("test case does not exist: {}", args.input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("input path has no file name")?;
    let test_command = args
        .test
        .canonicalize()
        .with_context(|| format!("tester program does not exist: {}", args.test.display()))?;

    let out_dir = args.out.clone().unwrap_or_else(|| default_out_dir(&input));
    let tests_dir = out_dir.join("tests");
    std::fs::create_dir_all(&tests_dir)
        .with_context(|| format!("creating working directory {}", tests_dir.display()))?;

    let _log_guard = configure_logging(&args.log_level, &out_dir);
    install_panic_hook();
    info!(
        target: "reduce",
        input = %input.display(),
        out = %out_dir.display(),
        cache = %settings.cache,
        split = %settings.split,
        parallel = settings.parallel,
        "reduce session starts"
    );

    let mut cache = SharedCache::new(
        core_cache::lookup(&settings.cache, settings.policy).ok_or_else(|| {
            anyhow!(
                "unknown cache strategy {:?} (expected one of: {})",
                settings.cache,
                core_cache::NAMES.join(", ")
            )
        })?,
    );
    let combined = CombinedIterator::new(
        !args.complement_first,
        iterator::lookup(&settings.subset_iterator).ok_or_else(|| {
            anyhow!(
                "unknown subset iterator {:?} (expected one of: {})",
                settings.subset_iterator,
                iterator::NAMES.join(", ")
            )
        })?,
        iterator::lookup(&settings.complement_iterator).ok_or_else(|| {
            anyhow!(
                "unknown complement iterator {:?} (expected one of: {})",
                settings.complement_iterator,
                iterator::NAMES.join(", ")
            )
        })?,
    );
    let stop = make_stop(&args);

    let mut src = source::load_input(&input)?;
    for (phase, kind) in settings.atom.phases().into_iter().enumerate() {
        let atoms = source::atoms(&src, kind);
        if atoms.is_empty() {
            bail!("input produced no {} atoms", kind.label());
        }
        info!(
            target: "reduce",
            phase = kind.label(),
            atoms = atoms.len(),
            "phase starts"
        );
        let atom_count = atoms.len();
        let builder: Arc<dyn TestBuilder> = Arc::new(ConcatTestBuilder::new(atoms));

        cache.clear();
        cache.set_test_builder(Arc::clone(&builder));

        let tester = Arc::new(SubprocessTest::new(
            Arc::clone(&builder),
            test_command.clone(),
            tests_dir.clone(),
            filename.clone(),
            args.cleanup,
        ));
        let split = splitter::lookup(&settings.split, settings.granularity).ok_or_else(|| {
            anyhow!(
                "unknown split algorithm {:?} (expected one of: {})",
                settings.split,
                splitter::NAMES.join(", ")
            )
        })?;
        let prefix = ConfigId::new(vec![IdTag::Atom(phase)]);
        let initial: Vec<usize> = (0..atom_count).collect();

        let outcome = if settings.parallel {
            let mut reducer = ParallelReducer::new(tester)
                .with_cache(Box::new(cache.clone()))
                .with_split(split)
                .with_iterator(combined)
                .with_dd_star(args.dd_star)
                .with_id_prefix(prefix);
            if let Some(jobs) = settings.jobs {
                reducer = reducer.with_jobs(jobs);
            }
            if let Some(percent) = args.max_utilization {
                reducer = reducer.with_max_utilization(percent);
            }
            if let Some(stop) = stop.clone() {
                reducer = reducer.with_stop(Box::new(stop));
            }
            reducer.reduce(initial)
        } else {
            let mut reducer = Reducer::new(tester)
                .with_cache(Box::new(cache.clone()))
                .with_split(split)
                .with_iterator(combined)
                .with_dd_star(args.dd_star)
                .with_id_prefix(prefix);
            if let Some(stop) = stop.clone() {
                reducer = reducer.with_stop(Box::new(stop));
            }
            reducer.reduce(initial)
        };

        match outcome {
            Ok(minimal) => {
                src = builder.build(&minimal);
                info!(
                    target: "reduce",
                    phase = kind.label(),
                    size_bytes = src.len(),
                    "phase done"
                );
            }
            Err(failure) => {
                warn!(
                    target: "reduce",
                    reason = %failure,
                    "reduction ended prematurely; the output may not be minimal"
                );
                src = builder.build(&failure.result);
                finalize(&out_dir, &tests_dir, &filename, &src, args.cleanup)?;
                return match failure.kind {
                    FailureKind::Stopped(_) => Ok(()),
                    FailureKind::Error(err) => Err(err.context("reduction error")),
                };
            }
        }
    }

    finalize(&out_dir, &tests_dir, &filename, &src, args.cleanup)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("whittle: {err:#}");
            ExitCode::FAILURE
        }
    }
}
