use super::*;

#[derive(Clone, Default, Debug, Parser)]
pub struct Options {
    #[arg(long, help = "Load configuration from <CONFIG>.")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Load configuration from <CONFIG_DIR>/scratchminer.toml."
    )]
    pub config_dir: Option<PathBuf>,

    #[arg(
        long,
        short = 'o',
        help = "Mine at pool <URL>: stratum+tcp://host:port, http(s)://host[:port][/path] or \
                stratum+tcp://_service._tcp.domain for SRV lookup."
    )]
    pub url: Option<PoolUrl>,

    #[arg(long, short = 'u', help = "Log in to the pool as <USER>.")]
    pub user: Option<String>,

    #[arg(long, short = 'p', help = "Log in to the pool with <PASS>.")]
    pub pass: Option<String>,

    #[arg(
        long,
        short = 'O',
        value_name = "USER:PASS",
        help = "Log in to the pool with <USER:PASS>."
    )]
    pub userpass: Option<String>,

    #[arg(long, short = 't', help = "Hash on <THREADS> threads. [default: CPU count]")]
    pub threads: Option<usize>,

    #[arg(
        long,
        short = 'r',
        allow_hyphen_values = true,
        help = "Give up after <RETRIES> failed attempts, -1 to retry forever. [default: -1]"
    )]
    pub retries: Option<i64>,

    #[arg(
        long,
        short = 'R',
        help = "Wait <RETRY_PAUSE> seconds between attempts. [default: 30]"
    )]
    pub retry_pause: Option<u64>,

    #[arg(
        long,
        short = 'T',
        help = "Time out long-polls after <TIMEOUT> seconds, 0 for never. [default: 0]"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long,
        short = 's',
        help = "Poll for new work every <SCANTIME> seconds without long-polling. [default: 5]"
    )]
    pub scantime: Option<u64>,

    #[arg(
        long,
        help = "Drop a Stratum connection after <STRATUM_TIMEOUT> silent seconds. [default: 400]"
    )]
    pub stratum_timeout: Option<u64>,

    #[arg(long, help = "Poll for work instead of long-polling.")]
    pub no_longpoll: bool,

    #[arg(long, help = "Refuse Stratum pool urls.")]
    pub no_stratum: bool,

    #[arg(long, help = "Download the initial scratchpad from <SCRATCHPAD_URL>.")]
    pub scratchpad_url: Option<Url>,

    #[arg(long, help = "Cache the scratchpad at <SCRATCHPAD_CACHE>.")]
    pub scratchpad_cache: Option<PathBuf>,

    #[arg(long, short = 'q', help = "Only log warnings and errors.")]
    pub quiet: bool,

    #[arg(long, short = 'D', help = "Enable debug logging.")]
    pub debug: bool,

    #[arg(long, short = 'P', help = "Log every line exchanged with the pool.")]
    pub protocol_dump: bool,
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn default_options() {
        let options = Options::default();
        assert!(options.url.is_none());
        assert!(!options.no_longpoll);
        assert!(!options.quiet);
    }

    #[test]
    fn short_flags() {
        let options = Options::try_parse_from([
            "scratchminer",
            "-o",
            "stratum+tcp://pool.example:7777",
            "-u",
            "wallet",
            "-p",
            "x",
            "-t",
            "4",
            "-D",
        ])
        .unwrap();

        assert_eq!(options.url.unwrap().port(), Some(7777));
        assert_eq!(options.user.as_deref(), Some("wallet"));
        assert_eq!(options.threads, Some(4));
        assert!(options.debug);
    }

    #[test]
    fn retry_forever() {
        let options = Options::try_parse_from(["scratchminer", "--retries", "-1"]).unwrap();
        assert_eq!(options.retries, Some(-1));
    }

    #[test]
    fn invalid_url() {
        assert!(Options::try_parse_from(["scratchminer", "--url", "ftp://pool"]).is_err());
    }
}
