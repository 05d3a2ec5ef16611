use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::{ArgAction, Parser as ClapParser};
use ethbal_common::{
    codec::Profile,
    stats::{AccountStats, ComponentSizes, kib},
    trace::{BlockInput, ExtractOptions, build_block},
};
use eyre::{WrapErr, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{Level, debug, info};

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "ethbal",
    version,
    about = "Builds EIP-7928 block access lists from prestate traces and reports their encoded sizes"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "trace",
        value_name = "TRACE_FILE",
        help = "Diff-mode prestate trace of the block, one entry per transaction.",
        long_help = "Either the bare `debug_traceBlockByNumber` result array or the full JSON-RPC response wrapping it.",
        help_heading = "Input options",
        env = "ETHBAL_TRACE"
    )]
    pub trace: PathBuf,
    #[arg(
        long = "reads",
        value_name = "TRACE_FILE",
        help = "Non-diff prestate trace used for extra storage reads and balance touches.",
        help_heading = "Input options",
        env = "ETHBAL_READS"
    )]
    pub reads: Option<PathBuf>,
    #[arg(
        long = "receipts",
        value_name = "RECEIPTS_FILE",
        help = "Block receipts, used to detect reverted transactions.",
        help_heading = "Input options",
        env = "ETHBAL_RECEIPTS"
    )]
    pub receipts: Option<PathBuf>,
    #[arg(
        long = "block-info",
        value_name = "BLOCK_FILE",
        help = "Block with its transactions, used to keep the gas payments of reverted transactions.",
        help_heading = "Input options",
        env = "ETHBAL_BLOCK_INFO"
    )]
    pub block_info: Option<PathBuf>,
    #[arg(
        long = "profile",
        default_value_t = ProfileSelection::Both,
        value_name = "PROFILE",
        help = "Encoding profile to produce.",
        long_help = "Possible values: ssz, rlp, both",
        help_heading = "Output options",
        env = "ETHBAL_PROFILE"
    )]
    pub profile: ProfileSelection,
    #[arg(
        long = "no-reads",
        action = ArgAction::SetTrue,
        help = "Leave storage reads and touched-only accounts out of the list.",
        help_heading = "Output options",
        env = "ETHBAL_NO_READS"
    )]
    pub no_reads: bool,
    #[arg(
        long = "output",
        value_name = "OUTPUT_DIR",
        help = "Directory where encoded lists are written as `<stem>.<profile>.bin`.",
        help_heading = "Output options",
        env = "ETHBAL_OUTPUT"
    )]
    pub output: Option<PathBuf>,
    #[arg(
        long = "json",
        action = ArgAction::SetTrue,
        help = "Print stats and sizes to stdout as JSON.",
        help_heading = "Output options"
    )]
    pub json: bool,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "ETHBAL_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Logging options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        help_heading = "Logging options",
        env = "ETHBAL_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProfileSelection {
    Ssz,
    Rlp,
    #[default]
    Both,
}

impl ProfileSelection {
    pub fn profiles(self) -> Vec<Profile> {
        match self {
            ProfileSelection::Ssz => vec![Profile::Ssz],
            ProfileSelection::Rlp => vec![Profile::Rlp],
            ProfileSelection::Both => Profile::ALL.to_vec(),
        }
    }
}

impl Display for ProfileSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileSelection::Ssz => write!(f, "ssz"),
            ProfileSelection::Rlp => write!(f, "rlp"),
            ProfileSelection::Both => write!(f, "both"),
        }
    }
}

impl FromStr for ProfileSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("both") {
            return Ok(ProfileSelection::Both);
        }
        match s.parse::<Profile>() {
            Ok(Profile::Ssz) => Ok(ProfileSelection::Ssz),
            Ok(Profile::Rlp) => Ok(ProfileSelection::Rlp),
            Err(_) => Err(format!(
                "Invalid profile '{s}'. Expected: ssz, rlp, or both"
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{}'. Expected: auto, always, or never",
                s
            )),
        }
    }
}

/// What a run produced, printed with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub stats: AccountStats,
    pub sizes: Vec<ComponentSizes>,
}

/// Trace dumps are accepted either bare or as the JSON-RPC response that
/// carried them.
#[derive(Deserialize)]
#[serde(untagged)]
enum RpcPayload<T> {
    Response { result: T },
    Bare(T),
}

impl<T> RpcPayload<T> {
    fn into_inner(self) -> T {
        match self {
            RpcPayload::Response { result } => result,
            RpcPayload::Bare(value) => value,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> eyre::Result<T> {
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let payload: RpcPayload<T> = serde_json::from_str(&contents)
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;
    Ok(payload.into_inner())
}

fn read_input(opts: &Options) -> eyre::Result<BlockInput> {
    Ok(BlockInput {
        diff_traces: read_json(&opts.trace)?,
        read_traces: opts.reads.as_deref().map(read_json).transpose()?,
        receipts: opts.receipts.as_deref().map(read_json).transpose()?,
        block_info: opts.block_info.as_deref().map(read_json).transpose()?,
    })
}

fn output_stem(trace: &Path) -> &str {
    trace
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("block")
}

pub fn run(opts: &Options) -> eyre::Result<Report> {
    let input = read_input(opts)?;
    debug!(
        transactions = input.diff_traces.len(),
        reads = input.read_traces.is_some(),
        receipts = input.receipts.is_some(),
        block_info = input.block_info.is_some(),
        "Loaded block input"
    );

    let options = ExtractOptions {
        ignore_reads: opts.no_reads,
    };
    let bal = build_block(&input, &options).wrap_err("Failed to build block access list")?;

    let stats = AccountStats::from_bal(&bal);
    info!(
        accounts = stats.total_accounts,
        storage_writes = stats.total_storage_writes,
        storage_reads = stats.total_storage_reads,
        balance_changes = stats.total_balance_changes,
        nonce_changes = stats.total_nonce_changes,
        code_changes = stats.total_code_changes,
        "Built block access list"
    );

    if let Some(dir) = &opts.output {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut sizes = Vec::new();
    for profile in opts.profile.profiles() {
        let encoded = profile.encode(&bal);
        let decoded = profile
            .decode(&encoded)
            .wrap_err_with(|| format!("Failed to decode freshly encoded {profile} output"))?;
        if decoded != bal {
            bail!("{profile} encoding did not round-trip");
        }

        if let Some(dir) = &opts.output {
            let path = dir.join(format!("{}.{profile}.bin", output_stem(&opts.trace)));
            fs::write(&path, &encoded)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = encoded.len(), "Wrote encoded list");
        }

        let component = ComponentSizes::measure(&bal, profile)
            .wrap_err_with(|| format!("Failed to measure {profile} sizes"))?;
        info!(
            %profile,
            storage_kib = kib(component.storage_total),
            balance_kib = kib(component.balance_changes),
            nonce_kib = kib(component.nonce_changes),
            code_kib = kib(component.code_changes),
            total_kib = kib(component.total),
            block_raw = component.block_raw,
            block_compressed = component.block_compressed,
            "Encoded sizes"
        );
        sizes.push(component);
    }

    Ok(Report { stats, sizes })
}
