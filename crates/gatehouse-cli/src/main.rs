use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gatehouse_directory::{DirectoryFile, FsUserDirectory, NewUser, UserDirectory};
use gatehouse_session::{
    AuthorizationGate, BrokerError, MemoryIdentityBroker, RawIdentity, Role, SessionConfig,
    SessionEvent, SessionEventSink, SessionState, SessionStateMachine, session_event_channel,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gatehouse-cli")]
#[command(about = "Command-line host for the Gatehouse session machine")]
struct Cli {
    /// Emit logs on stderr as JSON lines.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Check(CheckArgs),
    Users(UsersArgs),
    AddUser(AddUserArgs),
    Simulate(SimulateArgs),
}

#[derive(clap::Args, Debug)]
struct DirectoryArgs {
    /// Path of the JSON user directory.
    #[arg(long, env = "GATEHOUSE_DIRECTORY")]
    directory: PathBuf,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    directory: DirectoryArgs,
    #[arg(long)]
    email: String,
}

#[derive(clap::Args, Debug)]
struct UsersArgs {
    #[command(flatten)]
    directory: DirectoryArgs,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct AddUserArgs {
    #[command(flatten)]
    directory: DirectoryArgs,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Member)]
    role: RoleArg,
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    directory: DirectoryArgs,
    /// Identity the provider already holds when the first machine starts.
    #[arg(long)]
    signed_in: Option<String>,
    /// A completed redirect waiting to be consumed by the first machine.
    #[arg(long, conflicts_with = "redirect_fails")]
    redirect_email: Option<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    redirect_fails: bool,
    /// Identity the provider returns after the next `login` step.
    #[arg(long)]
    next_sign_in: Option<String>,
    #[arg(long = "step", value_enum)]
    steps: Vec<Step>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    events: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    Member,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Member => Role::Member,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Step {
    Login,
    Reload,
    Logout,
    SignOutProvider,
}

impl Step {
    fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Reload => "reload",
            Self::Logout => "logout",
            Self::SignOutProvider => "sign-out-provider",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let result = match cli.command {
        Commands::Check(args) => check_command(args).await,
        Commands::Users(args) => users_command(args).await,
        Commands::AddUser(args) => add_user_command(args).await,
        Commands::Simulate(args) => simulate_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open_directory(args: &DirectoryArgs) -> Result<FsUserDirectory, String> {
    FsUserDirectory::open(&args.directory).map_err(|error| {
        format!(
            "failed opening directory '{}': {error}",
            args.directory.display()
        )
    })
}

async fn check_command(args: CheckArgs) -> Result<ExitCode, String> {
    let directory = open_directory(&args.directory)?;
    match directory
        .lookup(&args.email)
        .await
        .map_err(|error| error.to_string())?
    {
        Some(user) => {
            println!("authorized: {}", user.email);
            println!("id: {}", user.id);
            println!("name: {}", user.name);
            println!("role: {}", user.role);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("not authorized: {}", args.email.trim());
            Ok(ExitCode::from(2))
        }
    }
}

async fn users_command(args: UsersArgs) -> Result<ExitCode, String> {
    let directory = open_directory(&args.directory)?;
    let users = directory
        .list_users()
        .await
        .map_err(|error| error.to_string())?;
    if args.json {
        let json = serde_json::to_string_pretty(&DirectoryFile { users })
            .map_err(|error| error.to_string())?;
        println!("{json}");
    } else if users.is_empty() {
        println!("no users");
    } else {
        for user in users {
            println!("{} {} {} ({})", user.id, user.email, user.name, user.role);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn add_user_command(args: AddUserArgs) -> Result<ExitCode, String> {
    let directory = open_directory(&args.directory)?;
    let user = directory
        .register_user(NewUser::new(args.name, args.email, args.role.into()))
        .await
        .map_err(|error| error.to_string())?;
    tracing::info!(user.id = user.id, user.role = %user.role, "user registered");
    println!("added: {} {} ({})", user.id, user.email, user.role);
    Ok(ExitCode::SUCCESS)
}

async fn simulate_command(args: SimulateArgs) -> Result<ExitCode, String> {
    let directory: Arc<dyn AuthorizationGate> = Arc::new(open_directory(&args.directory)?);

    let mut broker = MemoryIdentityBroker::new();
    if let Some(email) = args.signed_in.as_deref() {
        broker = broker.with_signed_in(simulated_identity(email));
    }
    if let Some(email) = args.redirect_email.as_deref() {
        broker = broker.with_pending_redirect(simulated_identity(email));
    }
    if args.redirect_fails {
        broker = broker.with_failed_redirect(BrokerError::Redirect(
            "redirect state mismatch".to_string(),
        ));
    }
    if let Some(email) = args.next_sign_in.as_deref() {
        broker.set_next_sign_in(Some(simulated_identity(email)));
    }
    let broker = Arc::new(broker);

    let (events, event_task) = event_stream(args.events, args.json);
    let mut machine = start_machine(&broker, &directory, events.clone()).await;
    report("start", &machine.initialized().await, args.json)?;

    for step in args.steps {
        match step {
            Step::Login => {
                if let Err(error) = machine.login().await {
                    tracing::warn!(%error, "login step failed");
                }
            }
            Step::Reload => {
                machine.shutdown();
                machine = start_machine(&broker, &directory, events.clone()).await;
                machine.initialized().await;
            }
            Step::Logout => {
                if let Err(error) = machine.logout().await {
                    tracing::warn!(%error, "logout step failed");
                }
            }
            Step::SignOutProvider => broker.simulate_sign_out(),
        }
        let state = machine.settled().await;
        report(step.label(), &state, args.json)?;
    }

    machine.shutdown();
    drop(machine);
    drop(events);
    if let Some(task) = event_task {
        task.await.map_err(|error| error.to_string())?;
    }

    let calls = broker.calls();
    tracing::debug!(
        provider.sign_out = calls.sign_out,
        provider.begin_redirect_sign_in = calls.begin_redirect_sign_in,
        "simulation finished"
    );
    Ok(ExitCode::SUCCESS)
}

async fn start_machine(
    broker: &Arc<MemoryIdentityBroker>,
    gate: &Arc<dyn AuthorizationGate>,
    events: SessionEventSink,
) -> SessionStateMachine {
    SessionStateMachine::start_with_events(
        broker.clone(),
        Arc::clone(gate),
        SessionConfig::default(),
        events,
    )
    .await
}

fn simulated_identity(email: &str) -> RawIdentity {
    RawIdentity::with_email(format!("sim-{}", email.trim()), email)
}

fn event_stream(
    stream_events: bool,
    event_json: bool,
) -> (SessionEventSink, Option<tokio::task::JoinHandle<()>>) {
    if !stream_events {
        return (SessionEventSink::default(), None);
    }

    let (tx, mut rx) = session_event_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(_) => print_event_text(&event),
                }
            } else {
                print_event_text(&event);
            }
        }
    });
    (SessionEventSink::with_sender(tx), Some(task))
}

fn print_event_text(event: &SessionEvent) {
    println!(
        "[event seq={}] {} {}",
        event.sequence_no,
        event.timestamp,
        event.kind.label()
    );
}

fn report(step: &str, state: &SessionState, json: bool) -> Result<(), String> {
    if json {
        let line = serde_json::to_string(&serde_json::json!({ "step": step, "state": state }))
            .map_err(|error| error.to_string())?;
        println!("{line}");
        return Ok(());
    }

    println!("step: {step}");
    println!("  phase: {}", state.phase);
    match state.user.as_ref() {
        Some(user) => println!("  user: {} ({})", user.email, user.role),
        None => println!("  user: <none>"),
    }
    println!("  loading: {}", state.is_loading);
    println!("  initializing: {}", state.is_initializing);
    println!("  error: {}", state.error_message().unwrap_or("<none>"));
    Ok(())
}
