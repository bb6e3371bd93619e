use {
    anyhow::Error,
    arguments::Arguments,
    async_trait::async_trait,
    backon::ConstantBuilder,
    byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt},
    clap::Parser,
    context::MiningContext,
    coordinator::{LP_SCANTIME, ScanMode, Solution, WorkerConfig, WorkerCoordinator},
    futures::StreamExt,
    hasher::{Hasher, WildKeccak},
    hashrate::HashRate,
    job::{Job, JobError, JobState},
    options::Options,
    parking_lot::{Mutex, RwLock},
    pool_protocol::{
        Addendum, Blob, FullScratchpad, GetFullScratchpad, GetJob, Hash32, HeightInfo, Id,
        JobTemplate, Login, LoginResult, METHOD_GETFULLSCRATCHPAD, METHOD_GETJOB, METHOD_JOB,
        METHOD_LOGIN, METHOD_SUBMIT, Message, NONCE_OFFSET, NONCE_SIZE, QUAD_WORDS, RpcError,
        Submit, SubmitResult, Target,
    },
    reqwest::Url,
    scratchpad::{
        ADDENDUM_LOG_CAPACITY, AddendumOutcome, CACHE_EXPIRATION, CacheError,
        SCRATCHPAD_CAPACITY_WORDS, ScratchpadError, ScratchpadHeight, ScratchpadStore,
    },
    serde::{Deserialize, Serialize},
    serde_json::Value,
    serde_with::{DeserializeFromStr, SerializeDisplay},
    session::{
        DnsResolver, HttpSession, PoolUrl, RetryPolicy, SessionConfig, StratumSession, Transport,
    },
    settings::Settings,
    snafu::Snafu,
    stats::Stats,
    std::{
        collections::HashSet,
        env,
        fmt::{self, Display, Formatter},
        fs,
        io::{self, Write},
        iter::Sum,
        net::{IpAddr, SocketAddr},
        ops::{Add, Range},
        path::{Path, PathBuf},
        process,
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        thread,
        time::{Duration, Instant},
    },
    sysinfo::System,
    tokio::{
        io::{AsyncWriteExt, BufReader, BufWriter},
        net::{
            TcpStream, lookup_host,
            tcp::{OwnedReadHalf, OwnedWriteHalf},
        },
        runtime::Runtime,
        sync::mpsc,
        task::{self, JoinHandle, JoinSet},
        time::{MissedTickBehavior, interval, sleep, timeout},
    },
    tokio_util::{
        codec::{FramedRead, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt},
};

mod arguments;
mod bootstrap;
pub mod context;
pub mod coordinator;
pub mod hasher;
pub mod hashrate;
pub mod job;
mod logs;
pub mod options;
pub mod scratchpad;
pub mod session;
pub mod settings;
mod signal;
pub mod stats;
mod subcommand;

pub const USER_AGENT: &str = concat!("scratchminer/", env!("CARGO_PKG_VERSION"));

type Result<T = (), E = Error> = std::result::Result<T, E>;

fn print_error(err: &Error) {
    eprintln!("error: {err}");

    for (i, cause) in err.chain().skip(1).enumerate() {
        if i == 0 {
            eprintln!();
            eprintln!("because:");
        }
        eprintln!("- {cause}");
    }

    if env::var_os("RUST_BACKTRACE")
        .map(|val| val == "1")
        .unwrap_or_default()
    {
        eprintln!();
        eprintln!("{}", err.backtrace());
    }
}

pub fn main() {
    let args = Arguments::parse();

    let settings = match Settings::load(args.options.clone()) {
        Ok(settings) => settings,
        Err(err) => {
            print_error(&err);
            process::exit(1);
        }
    };

    let guard = logs::init(settings.log_level());

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            print_error(&Error::new(err).context("failed to create tokio runtime"));
            process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let cancel = signal::setup_signal_handler();
        args.run(settings, cancel).await
    });

    drop(runtime);
    drop(guard);

    match result {
        Ok(()) => process::exit(0),
        Err(err) => {
            print_error(&err);
            process::exit(1);
        }
    }
}
