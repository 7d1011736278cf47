use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use genealogy_client::{
    backend::{Backend, ChangeKind, MemoryBackend, RestBackend},
    config::Config,
    context::{AppContext, SessionStore},
    demo,
    error::{AppError, Result},
    models::{
        auth::{RegisterForm, SignUpOutcome},
        person::NewPerson,
        profile::ProfileUpdate,
        relation::RelationType,
    },
    services::{
        auth::AuthService,
        certification::{self, SimulatedLedger},
        dashboard::DashboardService,
        export::ExportService,
        links::LinkService,
        people::PeopleService,
        profiles::ProfileService,
        search::{SearchCriteria, SearchService},
        stats::StatsService,
        storage::StorageService,
        realtime::RealtimeService,
        tree::TreeState,
    },
    views,
};

#[derive(Parser)]
#[command(name = "genealogy", about = "Collaborative genealogy records")]
struct Cli {
    /// Run against an in-process backend seeded with a demo family
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
        #[arg(long, default_value = "")]
        username: String,
    },
    Signin {
        email: String,
        #[arg(long)]
        password: String,
    },
    Signout,
    Whoami,
    /// Send a password reset email
    ResetPassword { email: String },
    #[command(subcommand)]
    People(PeopleCommand),
    /// Show the one-hop family tree around a person
    Tree {
        #[arg(long)]
        center: Option<Uuid>,
    },
    /// Link a target person to the center person
    Relate {
        center: Uuid,
        /// parent, child, spouse or sibling: the role of the center person
        kind: RelationType,
        target: String,
    },
    Search {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        place: Option<String>,
    },
    #[command(subcommand)]
    Profile(ProfileCommand),
    Stats,
    Dashboard,
    /// Record a verified source
    Verify {
        #[arg(long)]
        person: Option<Uuid>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Hash a person record and run the simulated anchoring
    Certify { person: Uuid },
    /// Export the people you created as CSV
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    #[command(subcommand)]
    Storage(StorageCommand),
    /// Print row changes on a table
    Watch {
        table: String,
        #[arg(long, default_value = "*")]
        event: ChangeKind,
        /// Stop after this many changes
        #[arg(long)]
        count: Option<usize>,
    },
    /// Check the connection to the backend
    Ping,
}

#[derive(Subcommand)]
enum PeopleCommand {
    Add {
        first_name: String,
        last_name: String,
        #[arg(long)]
        born: Option<NaiveDate>,
        #[arg(long)]
        died: Option<NaiveDate>,
        #[arg(long)]
        place: Option<String>,
        #[arg(long)]
        private: bool,
        /// Store the record's content hash with it
        #[arg(long)]
        certify: bool,
    },
    List {
        /// Only the people you created
        #[arg(long)]
        mine: bool,
    },
    Show { id: Uuid },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long = "interest")]
        interests: Vec<String>,
    },
}

#[derive(Subcommand)]
enum StorageCommand {
    Upload { bucket: String, path: String, file: PathBuf },
    Download {
        bucket: String,
        path: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    Url { bucket: String, path: String },
    Rm {
        bucket: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = build_context(cli.memory).await?;

    match run(&ctx, cli.command).await {
        Ok(()) => Ok(()),
        // Auth and form errors are notifications, not crashes.
        Err(AppError::Auth(msg)) | Err(AppError::Validation(msg)) => {
            eprintln!("⚠ {msg}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn build_context(memory: bool) -> anyhow::Result<AppContext> {
    if memory {
        let config = Arc::new(Config::new("http://localhost:54321", "memory")?);
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let ctx = AppContext::new(config, backend, SessionStore::Ephemeral);
        demo::demo_sign_in(&ctx).await?;
        demo::seed_family(&ctx).await?;
        info!("Using in-memory backend with demo data");
        return Ok(ctx);
    }

    let config = Arc::new(Config::from_env()?);
    let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(&config));
    let store = SessionStore::File(config.session_file.clone());
    Ok(AppContext::init(config, backend, store).await?)
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Signup { email, password, confirm, username } => {
            let form = RegisterForm { email, password, confirm_password: confirm, username };
            match AuthService::sign_up(ctx, &form).await? {
                SignUpOutcome::SignedIn(session) => {
                    println!("Compte créé, connecté en tant que {}", session.user.id)
                }
                SignUpOutcome::ConfirmationRequired(_) => {
                    println!("Compte créé. Vérifiez votre email pour confirmer l'inscription.")
                }
            }
        }
        Command::Signin { email, password } => {
            let session = AuthService::sign_in(ctx, &email, &password).await?;
            println!("Connecté : {}", session.user.email.as_deref().unwrap_or("?"));
        }
        Command::Signout => {
            AuthService::sign_out(ctx).await?;
            println!("Déconnecté");
        }
        Command::Whoami => {
            let user = AuthService::current_user(ctx).await?;
            let profile = ProfileService::load(ctx, user.id).await;
            println!("{} <{}>", profile.display_name(user.email.as_deref()), user.id);
        }
        Command::ResetPassword { email } => {
            AuthService::reset_password(ctx, &email).await?;
            println!("Email de réinitialisation envoyé à {email}");
        }
        Command::People(cmd) => people(ctx, cmd).await?,
        Command::Tree { center } => {
            let mut state = TreeState::load(ctx).await;
            if let Some(id) = center {
                if state.select(id).is_none() {
                    return Err(AppError::NotFound(format!("personne {id}")));
                }
            }
            print!("{}", views::tree::render_state(&state));
        }
        Command::Relate { center, kind, target } => {
            let mut state = TreeState::load(ctx).await;
            if state.select(center).is_none() {
                return Err(AppError::NotFound(format!("personne {center}")));
            }
            state.add_relation(ctx, kind, &target).await?;
            println!("Relation ajoutée\n");
            print!("{}", views::tree::render_state(&state));
        }
        Command::Search { first_name, last_name, year, place } => {
            let criteria = SearchCriteria { first_name, last_name, birth_year: year, birth_place: place };
            let results = SearchService::search_or_empty(ctx, &criteria).await?;
            let summary = SearchService::summary(ctx, results.len()).await;
            print!("{}", views::search::render_results(&summary, &results));
        }
        Command::Profile(ProfileCommand::Show) => {
            let user = ctx.require_user()?;
            let profile = ProfileService::load(ctx, user.id).await;
            let stats = StatsService::for_user(ctx, &user).await;
            let name = profile.display_name(user.email.as_deref());
            print!("{}", views::profile::render_profile(&name, &profile, &stats));
        }
        Command::Profile(ProfileCommand::Update { username, bio, location, interests }) => {
            let changes = ProfileUpdate {
                username,
                bio,
                location,
                interests: (!interests.is_empty()).then_some(interests),
            };
            ProfileService::save(ctx, changes).await?;
            println!("Profil sauvegardé");
        }
        Command::Stats => {
            let user = ctx.require_user()?;
            let stats = StatsService::for_user(ctx, &user).await;
            print!("{}", views::profile::render_stats(&stats));
        }
        Command::Dashboard => {
            let dashboard = DashboardService::load(ctx).await?;
            print!("{}", views::dashboard::render(&dashboard));
        }
        Command::Verify { person, source } => {
            let link = LinkService::verify(ctx, person, source.as_deref()).await?;
            println!("Source vérifiée ({}) : +20 points", link.id);
        }
        Command::Certify { person } => {
            let person = PeopleService::get(ctx, person).await?;
            let ledger = SimulatedLedger::new(ctx.config().certification_delay);
            println!("Certification de {} en cours...", person.full_name());
            let cert = certification::certify(ctx, &ledger, &person).await?;
            println!("Certificat {}", cert.data.certificate_id);
            println!("  Empreinte SHA-256 : {}", cert.hash);
            println!("  Réseau : {} ({})", cert.data.blockchain.network, cert.data.blockchain.status);
            println!("  Bloc n°{}", cert.receipt.block_number);
            if cert.receipt.simulated {
                println!("  Ancrage simulé : ce numéro de bloc n'est pas vérifiable.");
            }
        }
        Command::Export { output } => {
            let csv = ExportService::my_people_csv(ctx).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, csv).await?;
                    println!("Export écrit dans {}", path.display());
                }
                None => print!("{csv}"),
            }
        }
        Command::Storage(cmd) => storage(ctx, cmd).await?,
        Command::Watch { table, event, count } => {
            let mut feed = RealtimeService::watch(ctx, &table, event).await?;
            let mut seen = 0;
            loop {
                tokio::select! {
                    change = feed.next() => {
                        let Some(change) = change else { break };
                        let record = change.record.or(change.old_record).unwrap_or_default();
                        println!("{} {} {}", change.kind.as_str(), change.table, record);
                        seen += 1;
                        if count.is_some_and(|n| seen >= n) {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            feed.unsubscribe();
        }
        Command::Ping => {
            if DashboardService::check_connection(ctx).await {
                println!("Connexion OK");
            } else {
                return Err(AppError::Backend { status: 0, message: "Connexion impossible".into() });
            }
        }
    }
    Ok(())
}

async fn people(ctx: &AppContext, cmd: PeopleCommand) -> Result<()> {
    match cmd {
        PeopleCommand::Add { first_name, last_name, born, died, place, private, certify } => {
            let mut person = NewPerson::new(&first_name, &last_name)?;
            if let Some(date) = born {
                person = person.born(date);
            }
            if let Some(date) = died {
                person = person.died(date);
            }
            if let Some(place) = place.as_deref() {
                person = person.born_in(place);
            }
            if private {
                person = person.private();
            }
            let created = PeopleService::create(ctx, person, certify).await?;
            println!("Ajouté : {} [{}]", views::person_line(&created), created.id);
        }
        PeopleCommand::List { mine } => {
            let people = if mine {
                let user = ctx.require_user()?;
                PeopleService::list_by_user(ctx, user.id).await?
            } else {
                PeopleService::list_public(ctx).await?
            };
            if people.is_empty() {
                println!("{}", views::tree::EMPTY_TREE);
            }
            for person in &people {
                println!("{} [{}]", views::person_line(person), person.id);
            }
        }
        PeopleCommand::Show { id } => {
            let person = PeopleService::get(ctx, id).await?;
            print!("{}", views::person_details(&person, Utc::now().date_naive()));
        }
    }
    Ok(())
}

async fn storage(ctx: &AppContext, cmd: StorageCommand) -> Result<()> {
    match cmd {
        StorageCommand::Upload { bucket, path, file } => {
            let key = StorageService::upload_file(ctx, &bucket, &path, &file).await?;
            println!("Envoyé : {key}");
        }
        StorageCommand::Download { bucket, path, output } => {
            let body: Bytes = StorageService::download(ctx, &bucket, &path).await?;
            let output = output.unwrap_or_else(|| {
                PathBuf::from(path.rsplit('/').next().unwrap_or(path.as_str()))
            });
            tokio::fs::write(&output, &body).await?;
            println!("{} octets écrits dans {}", body.len(), output.display());
        }
        StorageCommand::Url { bucket, path } => {
            println!("{}", StorageService::public_url(ctx, &bucket, &path)?);
        }
        StorageCommand::Rm { bucket, paths } => {
            StorageService::remove(ctx, &bucket, &paths).await?;
            println!("{} objet(s) supprimé(s)", paths.len());
        }
    }
    Ok(())
}
