use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tailorview_client::{
    config::Config,
    models::{
        EmailTemplate, LoginRequest, OutfitInputs, ReferenceImages, RegisterRequest, Role,
        UserUpdate,
    },
    services::{GenerationOutcome, GenerationStatus},
    utils::load_image,
    StudioClient,
};

#[derive(Parser, Debug)]
#[command(name = "tailorview")]
#[command(author, version, about = "Outfit visualization studio client", long_about = None)]
struct Cli {
    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Backend origin (default: http://localhost:8001)
    #[arg(long, env = "TAILORVIEW_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAILORVIEW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAILORVIEW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in profile as the server sees it
    Whoami,

    /// List the choices accepted for each outfit field
    Options,

    /// Generate an outfit visualization
    Generate(GenerateArgs),

    /// Email generated images
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Image request ids (repeatable)
        #[arg(long = "image", required = true)]
        images: Vec<Uuid>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },

    /// Administrative commands
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Photo of the person to dress
    #[arg(long)]
    model: PathBuf,
    #[arg(long)]
    fabric: Option<PathBuf>,
    #[arg(long)]
    shoe: Option<PathBuf>,
    #[arg(long)]
    accessory: Option<PathBuf>,

    #[arg(long)]
    atmosphere: String,
    #[arg(long)]
    suit_type: String,
    #[arg(long)]
    lapel_type: String,
    #[arg(long)]
    pocket_type: String,
    #[arg(long)]
    shoe_type: String,
    #[arg(long)]
    accessory_type: String,

    #[arg(long)]
    fabric_description: Option<String>,
    #[arg(long)]
    custom_shoe_description: Option<String>,
    #[arg(long)]
    custom_accessory_description: Option<String>,

    /// Also email the result to this address
    #[arg(long)]
    email: Option<String>,

    /// Follow up with modifications of the result, applied in order
    #[arg(long = "then-modify")]
    modifications: Vec<String>,

    /// Save the generated image(s) to the download directory
    #[arg(long)]
    download: bool,
}

#[derive(Subcommand, Debug)]
enum AdminCommands {
    /// Aggregate request statistics
    Stats,
    /// List accounts
    Users,
    /// List stored generation requests
    Requests,
    /// Failed deliveries waiting for retry
    Queue,
    /// Change an account's role, limits or status
    UpdateUser {
        user_id: Uuid,
        #[arg(long)]
        role: Option<RoleArg>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        used: Option<u32>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete an account
    DeleteUser { user_id: Uuid },
    /// Show the email template, or replace it when subject/body are given
    Template {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Debug, Clone, Copy)]
struct RoleArg(Role);

impl std::str::FromStr for RoleArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(RoleArg(Role::Client)),
            "user" => Ok(RoleArg(Role::User)),
            "admin" => Ok(RoleArg(Role::Admin)),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    let client = StudioClient::from_config(config)?;
    client.session.restore().await?;

    run(&client, cli.command).await
}

async fn run(client: &StudioClient, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = client.session.login(LoginRequest::new(email, password)).await?;
            println!("Signed in as {} ({})", user.display_name, user.role);
        }
        Commands::Register { name, email, password } => {
            let user = client
                .session
                .register(RegisterRequest::new(name, email, password))
                .await?;
            println!("Account created for {}", user.email);
        }
        Commands::Logout => {
            if client.session.logout().await {
                println!("Signed out");
            } else {
                println!("No active session");
            }
        }
        Commands::Whoami => {
            let user = client.session.who_am_i().await?;
            print_json(&user)?;
        }
        Commands::Options => {
            let options = client.api.options().await?;
            print_json(&options)?;
        }
        Commands::Generate(args) => generate(client, args).await?,
        Commands::Send { to, images, subject, body } => {
            let defaults = EmailTemplate::default();
            let template = EmailTemplate {
                subject: subject.unwrap_or(defaults.subject),
                body: body.unwrap_or(defaults.body),
            };
            let receipt = client.dispatch.send_batch(&images, &to, &template).await?;
            print_json(&receipt)?;
        }
        Commands::Admin(command) => admin(client, command).await?,
    }

    Ok(())
}

async fn generate(client: &StudioClient, args: GenerateArgs) -> Result<()> {
    let mut images = ReferenceImages::with_model(
        load_image(&args.model)
            .await
            .with_context(|| format!("Failed to read {}", args.model.display()))?,
    );
    if let Some(path) = &args.fabric {
        images.fabric = Some(load_image(path).await?);
    }
    if let Some(path) = &args.shoe {
        images.shoe = Some(load_image(path).await?);
    }
    if let Some(path) = &args.accessory {
        images.accessory = Some(load_image(path).await?);
    }

    let inputs = OutfitInputs {
        atmosphere: args.atmosphere,
        suit_type: args.suit_type,
        lapel_type: args.lapel_type,
        pocket_type: args.pocket_type,
        shoe_type: args.shoe_type,
        accessory_type: args.accessory_type,
        fabric_description: args.fabric_description,
        custom_shoe_description: args.custom_shoe_description,
        custom_accessory_description: args.custom_accessory_description,
        email: args.email,
    };

    let mut progress = client.generation.watch();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = progress.borrow_and_update().clone();
            if state.status == GenerationStatus::InProgress {
                eprint!("\rGenerating... {:>3}%", state.progress);
            }
        }
    });

    let result = generate_then_modify(client, inputs, images, &args.modifications).await;
    reporter.abort();
    eprintln!();
    let outcomes = result?;

    print_json(&outcomes)?;
    if args.download {
        for outcome in &outcomes {
            let path = client
                .api
                .download(&outcome.artifact, &client.config.download_dir)
                .await?;
            println!("Saved to {}", path.display());
        }
    }

    Ok(())
}

async fn generate_then_modify(
    client: &StudioClient,
    inputs: OutfitInputs,
    images: ReferenceImages,
    modifications: &[String],
) -> Result<Vec<GenerationOutcome>> {
    let mut outcomes = vec![client.generation.submit(inputs, images).await?];

    for description in modifications {
        let parent = outcomes
            .last()
            .map(|outcome| outcome.artifact.request_id)
            .context("No image to modify")?;
        outcomes.push(client.generation.modify(parent, description).await?);
    }

    Ok(outcomes)
}

async fn admin(client: &StudioClient, command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Stats => print_json(&client.admin.stats().await?)?,
        AdminCommands::Users => print_json(&client.admin.list_users().await?)?,
        AdminCommands::Requests => print_json(&client.admin.list_requests().await?)?,
        AdminCommands::Queue => print_json(&client.admin.email_queue().await?)?,
        AdminCommands::UpdateUser { user_id, role, limit, used, active } => {
            let update = UserUpdate {
                role: role.map(|RoleArg(role)| role),
                images_limit_total: limit,
                images_used_total: used,
                is_active: active,
            };
            client.admin.update_user(user_id, &update).await?;
            println!("User {} updated", user_id);
        }
        AdminCommands::DeleteUser { user_id } => {
            client.admin.delete_user(user_id).await?;
            println!("User {} deleted", user_id);
        }
        AdminCommands::Template { subject, body } => {
            if subject.is_none() && body.is_none() {
                print_json(&client.admin.email_template().await?)?;
            } else {
                let current = client.admin.email_template().await?;
                let template = EmailTemplate {
                    subject: subject.unwrap_or(current.subject),
                    body: body.unwrap_or(current.body),
                };
                client.admin.update_email_template(&template).await?;
                println!("Email template updated");
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
