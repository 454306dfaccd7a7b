use clap::{Parser, Subcommand, ValueEnum};

use wordsum::log::{init_logger, prefixed};
use wordsum::opcode::ByteOrder;
use wordsum::search::SearchConfig;
use wordsum::watch::{DebugWatcher, MetricWatcher, TraceWatcher, Watchers};
use wordsum::word::{solution_check, solution_mapping, ChoicePolicy, Solution};
use wordsum::{plan, solve, Backend, PlanOptions, Plan, Problem, SetupError, Strategy};

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "wordsum")]
#[command(about = "wordsum - word sum (cryptarithm) solver")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// CLI strategy selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliStrategy {
    /// Choose every letter, then check the sum
    NaiveBrute,
    /// Choose a column's letters, then check that column
    PrunedBrute,
    /// Right to left, computing the last letter of each column
    BottomUp,
    /// Left to right, forking on every unknown carry
    TopDown,
}

impl From<CliStrategy> for Strategy {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::NaiveBrute => Strategy::NaiveBrute,
            CliStrategy::PrunedBrute => Strategy::PrunedBrute,
            CliStrategy::BottomUp => Strategy::BottomUp,
            CliStrategy::TopDown => Strategy::TopDown,
        }
    }
}

/// CLI backend selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliBackend {
    /// Step-IR programs
    Steps,
    /// Byte encoded programs on the tiny machine
    Opcode,
}

impl From<CliBackend> for Backend {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Steps => Backend::Steps,
            CliBackend::Opcode => Backend::Opcode,
        }
    }
}

/// CLI letter choice policy
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliChoice {
    /// First unknown letter in column order
    First,
    /// Letter with the smallest range
    Best,
}

impl From<CliChoice> for ChoicePolicy {
    fn from(cli: CliChoice) -> Self {
        match cli {
            CliChoice::First => ChoicePolicy::First,
            CliChoice::Best => ChoicePolicy::Best,
        }
    }
}

/// Problem and planning options shared by every subcommand
#[derive(clap::Args)]
struct PlanArgs {
    /// First addend
    w1: String,
    /// Second addend
    w2: String,
    /// Sum
    w3: String,
    /// Number base
    #[arg(long, default_value = "10")]
    base: u8,
    /// Planning strategy
    #[arg(long, value_enum, default_value = "top-down")]
    strategy: CliStrategy,
    /// Code generation backend
    #[arg(long, value_enum, default_value = "steps")]
    backend: CliBackend,
    /// How to pick the next letter to branch on
    #[arg(long, value_enum, default_value = "first")]
    choice: CliChoice,
    /// Verify the whole mapping before accepting a solution
    #[arg(long)]
    verified: bool,
    /// Byte order of opcode programs (big, little, native)
    #[arg(long, default_value = "native")]
    byte_order: String,
    /// Narrate planning
    #[arg(long)]
    log_plan: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a word sum
    Solve {
        #[command(flatten)]
        plan: PlanArgs,
        /// Find every solution instead of stopping at the first
        #[arg(long)]
        all: bool,
        /// Print the compiled program before solving
        #[arg(long)]
        dump: bool,
        /// Print the execution trace of each solution
        #[arg(long)]
        trace: bool,
        /// Log every search event
        #[arg(long)]
        debug: bool,
        /// Override the plan's step budget
        #[arg(long)]
        max_steps: Option<u64>,
        /// Print search statistics
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the annotated program for a word sum
    Dump {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

fn setup_problem(args: &PlanArgs) -> Result<Problem, SetupError> {
    Problem::setup_with_base(&args.w1, &args.w2, &args.w3, args.base)
}

fn build_plan(
    args: &PlanArgs,
    annotated: bool,
    search: SearchConfig,
) -> Result<Box<dyn Plan>, Box<dyn std::error::Error>> {
    let prob = setup_problem(args).map_err(|e| {
        let mut msg = format!("[{}] {}", e.code(), e);
        if let Some(help) = e.help() {
            msg.push_str(&format!("\n  help: {help}"));
        }
        msg
    })?;
    let byte_order: ByteOrder = args.byte_order.parse()?;
    let opts = PlanOptions::default()
        .with_verified(args.verified)
        .with_annotated(annotated)
        .with_logged(args.log_plan)
        .with_choice(args.choice.into())
        .with_search(search)
        .with_byte_order(byte_order);
    Ok(plan(&prob, args.strategy.into(), args.backend.into(), &opts)?)
}

fn print_dump(plan: &dyn Plan) {
    plan.dump(&mut |line| println!("{line}"));
}

/// Options for the solve subcommand
struct SolveOptions {
    all: bool,
    dump: bool,
    trace: bool,
    debug: bool,
    max_steps: Option<u64>,
    verbose: bool,
}

fn run_solve(args: &PlanArgs, options: &SolveOptions) -> Result<bool, Box<dyn std::error::Error>> {
    let search = SearchConfig::default().with_max_steps_option(options.max_steps);
    let annotated = options.dump || options.debug || options.trace;
    let plan = build_plan(args, annotated, search)?;

    if options.dump {
        print_dump(plan.as_ref());
        println!();
    }

    let mut metrics = MetricWatcher::new();
    let mut tracer = TraceWatcher::new();
    let mut debugger = DebugWatcher::new().with_plan(plan.as_ref());
    let mut watchers = Watchers::new().with(&mut metrics);
    if options.trace {
        watchers.push(&mut tracer);
    }
    if options.debug {
        watchers.push(&mut debugger);
    }

    let solved = solve(plan.as_ref(), options.all, Some(&mut watchers))?;
    drop(watchers);

    for sol in &solved.solutions {
        println!("Solution: {}", solution_mapping(sol));
        let mut out = |line: &str| println!("{line}");
        solution_check(sol, &mut out);
        if options.trace {
            let mut out = prefixed(&mut out, &["Trace:", "      "]);
            sol.dump(&mut out);
        }
    }
    if solved.solutions.is_empty() {
        println!("No solution found.");
    }

    if options.verbose {
        println!();
        println!("{}", solved.report.statistics.format_summary());
        println!("{}", metrics.format_summary());
    }
    Ok(!solved.solutions.is_empty())
}

fn main() {
    let args = Args::parse();

    match args.command {
        Commands::Solve {
            plan,
            all,
            dump,
            trace,
            debug,
            max_steps,
            verbose,
        } => {
            init_logger(debug);
            let options = SolveOptions {
                all,
                dump,
                trace,
                debug,
                max_steps,
                verbose,
            };
            match run_solve(&plan, &options) {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(2);
                }
            }
        }
        Commands::Dump { plan } => {
            init_logger(false);
            match build_plan(&plan, true, SearchConfig::default()) {
                Ok(p) => print_dump(p.as_ref()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(2);
                }
            }
        }
    }
}
