use std::sync::Arc;

use agrolink_api::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db::{self, DbConfig, DbPool},
    entities::user,
    services::{
        clock::SystemClock,
        users::{NewUser, UserService, UserView},
    },
    workflow::UserRole,
};
use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "agrolink-admin",
    about = "Operator tasks for AgroLink: migrations, bootstrap accounts, tokens",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending database migrations
    Migrate,
    /// Create a user account (use this to bootstrap the first admin)
    CreateUser(CreateUserArgs),
    /// Issue an access token for an existing user
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// ADMIN, FARMER, BUYER, DRIVER or AGRONOMIST
    #[arg(long, value_parser = parse_role)]
    role: UserRole,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    service_area: Option<String>,
}

#[derive(Args)]
struct IssueTokenArgs {
    #[arg(long, conflicts_with = "user_id", required_unless_present = "user_id")]
    email: Option<String>,
    #[arg(long)]
    user_id: Option<Uuid>,
}

fn parse_role(raw: &str) -> Result<UserRole, String> {
    raw.parse::<UserRole>()
        .map_err(|_| format!("unknown role '{}'", raw))
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(&config.log_level, config.log_json);
        let pool = db::establish_connection_with_config(&DbConfig::from(&config))
            .await
            .context("failed to connect to database")?;
        Ok(Self {
            config,
            db: Arc::new(pool),
        })
    }

    fn user_service(&self) -> UserService {
        UserService::new(self.db.clone(), Arc::new(SystemClock))
    }

    fn auth_service(&self) -> AuthService {
        AuthService::new(AuthConfig::from(&self.config), self.db.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("migrations failed")?;
            println!("Migrations applied");
        }
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::IssueToken(args) => handle_issue_token(&context, args, cli.json).await?,
    }

    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let created = context
        .user_service()
        .register(NewUser {
            name: args.name,
            email: args.email,
            phone: args.phone,
            role: args.role,
            service_area: args.service_area,
        })
        .await
        .context("failed to create user")?;

    if json {
        print_json(&UserView::from(created))?;
    } else {
        println!(
            "Created {} {} <{}> (id {})",
            created.role, created.name, created.email, created.id
        );
    }
    Ok(())
}

async fn handle_issue_token(context: &CliContext, args: IssueTokenArgs, json: bool) -> Result<()> {
    let found = match (args.user_id, args.email) {
        (Some(id), _) => user::Entity::find_by_id(id).one(&*context.db).await?,
        (None, Some(email)) => {
            user::Entity::find()
                .filter(user::Column::Email.eq(email.trim().to_lowercase()))
                .one(&*context.db)
                .await?
        }
        (None, None) => return Err(anyhow!("pass --email or --user-id")),
    };
    let account = found.ok_or_else(|| anyhow!("no such user"))?;

    let token = context
        .auth_service()
        .issue_token(&account)
        .map_err(|e| anyhow!("failed to issue token: {}", e))?;

    if json {
        print_json(&token)?;
    } else {
        println!("{}", token.access_token);
        eprintln!(
            "token for {} ({}) expires in {}s",
            account.email, account.role, token.expires_in
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
