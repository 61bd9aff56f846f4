mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::Parser;
use docchat_core::project::{CreateProject, UpdateProject};
use docchat_core::{Message, Project};
use docchat_service::{
    AuthSession, HttpClient, MessageService, NewDocument, ProjectService, UploadFile,
};
use docchat_store::{create_store, KeyValueStore};

use crate::config::{ChatCommand, Cli, Command, ProjectCommand, RemoteCommand};

const DEFAULT_LOG_FILTER: &str = "docchat=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(api_url = %cli.api_url, ephemeral = cli.ephemeral, "starting");
    let store = create_store(&cli.store_config());
    let session = AuthSession::new(store.clone());
    let client = HttpClient::from_config(&cli.client_config(session.token().await?));

    match cli.command {
        Command::Login { email, user_type } => {
            session.login(&client, &email, &user_type).await?;
            println!("logged in as {email}");
        }
        Command::Logout => {
            session.logout().await?;
            println!("logged out");
        }
        Command::Whoami => match session.current_user().await? {
            Some(user) => println!("{user}"),
            None => println!("not logged in"),
        },
        Command::Project(cmd) => run_project(store, cmd).await?,
        Command::Chat(cmd) => run_chat(store, &session, &client, cmd).await?,
        Command::Remote(cmd) => run_remote(&client, cmd).await?,
    }
    Ok(())
}

async fn run_project(store: Arc<dyn KeyValueStore>, cmd: ProjectCommand) -> anyhow::Result<()> {
    let mut projects = ProjectService::open(store).await?;
    match cmd {
        ProjectCommand::Create { name, description } => {
            let project = projects
                .create(&CreateProject { name, description })
                .await?;
            println!("{}", project.id);
        }
        ProjectCommand::List => {
            for project in projects.list() {
                println!("{}", project_line(project));
            }
        }
        ProjectCommand::Show { id } => {
            let project = projects
                .get(&id)
                .with_context(|| format!("no project {id}"))?;
            print_project(project);
        }
        ProjectCommand::Update {
            id,
            name,
            description,
            access_type,
            state,
        } => {
            let update = UpdateProject {
                name,
                description,
                access_type,
                state,
            };
            match projects.update(&id, &update).await? {
                Some(project) => println!("{}", project_line(&project)),
                None => bail!("no project {id}"),
            }
        }
        ProjectCommand::Publish { id } => match projects.publish(&id).await? {
            Some(project) => println!("{}", project_line(&project)),
            None => bail!("no project {id}"),
        },
        ProjectCommand::Archive { id } => match projects.archive(&id).await? {
            Some(project) => println!("{}", project_line(&project)),
            None => bail!("no project {id}"),
        },
        ProjectCommand::Delete { id } => {
            projects.delete(&id).await?;
            println!("deleted {id}");
        }
        ProjectCommand::Attach {
            id,
            path,
            document_type,
            description,
        } => {
            let (name, data) = read_upload(&path).await?;
            let doc = projects
                .attach_document(
                    &id,
                    NewDocument {
                        name,
                        description,
                        document_type,
                        data,
                    },
                )
                .await?;
            println!("{} {} ({} bytes)", doc.id, doc.name, doc.size);
        }
    }
    Ok(())
}

async fn run_chat(
    store: Arc<dyn KeyValueStore>,
    session: &AuthSession,
    client: &HttpClient,
    cmd: ChatCommand,
) -> anyhow::Result<()> {
    let mut messages = MessageService::new(store);
    match cmd {
        ChatCommand::Send {
            project,
            content,
            remote,
            user,
        } => {
            messages.load(&project).await?;
            let sent = messages.add_user_message(&content).await?;
            println!("{}", message_line(&sent));
            if remote {
                let user = match user {
                    Some(user) => user,
                    None => session
                        .current_user()
                        .await?
                        .context("log in or pass --user to chat remotely")?,
                };
                // A failed reply is reported, not fatal: the user message is already saved.
                match client.send_chat(&project, &user, &content).await {
                    Ok(reply) => {
                        let reply = messages.add_assistant_message(&reply).await?;
                        println!("{}", message_line(&reply));
                    }
                    Err(e) => eprintln!("assistant unavailable: {e}"),
                }
            }
        }
        ChatCommand::History { project } => {
            messages.load(&project).await?;
            for group in messages.groups() {
                println!("== {}", group.formatted_date);
                for message in &group.messages {
                    println!("  {}", message_line(message));
                }
            }
        }
        ChatCommand::Recent { limit } => {
            for message in messages.recent_messages(limit).await? {
                let preview = message.preview.as_deref().unwrap_or(&message.content);
                println!(
                    "{} [{}] {}",
                    message.timestamp.format("%Y-%m-%d %H:%M"),
                    message.project_id,
                    preview
                );
            }
        }
        ChatCommand::Delete {
            project,
            message_id,
        } => {
            messages.load(&project).await?;
            if messages.delete_message(&message_id).await? {
                println!("deleted {message_id}");
            } else {
                println!("no message {message_id}");
            }
        }
        ChatCommand::Read {
            project,
            message_id,
        } => {
            messages.load(&project).await?;
            if !messages.mark_message_as_read(&message_id).await? {
                bail!("no message {message_id}");
            }
        }
    }
    Ok(())
}

async fn run_remote(client: &HttpClient, cmd: RemoteCommand) -> anyhow::Result<()> {
    match cmd {
        RemoteCommand::Groups => {
            let groups = client.groups().await?;
            for group in groups.groups {
                println!("{group}");
            }
        }
        RemoteCommand::Projects { user } => {
            let projects = match user {
                Some(user) => client.list_projects_for_user(&user).await?,
                None => client.list_projects().await?,
            };
            for project in projects {
                let state = project.state.map(|s| s.as_str()).unwrap_or("-");
                println!("{}  {:<9}  {}", project.id, state, project.name);
            }
        }
        RemoteCommand::Create {
            name,
            description,
            files,
        } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let (name, data) = read_upload(path).await?;
                uploads.push(UploadFile {
                    name,
                    mime: None,
                    data,
                });
            }
            let project = client
                .create_project(&CreateProject { name, description }, uploads)
                .await?;
            println!("{}", project.id);
        }
        RemoteCommand::Publish { id } => {
            let project = client.publish_project(&id).await?;
            println!("{} published", project.id);
        }
        RemoteCommand::Delete { id } => {
            println!("{}", client.delete_project(&id).await?);
        }
        RemoteCommand::Messages { project, user } => {
            for message in client.list_messages(&project, &user).await? {
                println!(
                    "{} {:<9} {}",
                    message.timestamp.format("%H:%M"),
                    message.role,
                    message.content
                );
            }
        }
    }
    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<(String, Bytes)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("{} is not a file", path.display()))?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok((name, Bytes::from(data)))
}

fn project_line(project: &Project) -> String {
    format!(
        "{}  {:<9}  {}  (updated {})",
        project.id,
        project.state,
        project.name,
        project.updated_at.format("%Y-%m-%d %H:%M")
    )
}

fn print_project(project: &Project) {
    println!("{}", project_line(project));
    if let Some(description) = &project.description {
        println!("  {description}");
    }
    if let Some(access_type) = &project.access_type {
        println!("  access: {access_type}");
    }
    for doc in &project.documents {
        println!(
            "  - {} {} [{}] {} bytes",
            doc.id, doc.name, doc.document_type, doc.size
        );
    }
}

fn message_line(message: &Message) -> String {
    let read = if message.is_read() { " (read)" } else { "" };
    format!(
        "{} {} {:<9} {}{}",
        message.id,
        message.timestamp.format("%H:%M"),
        message.role,
        message.content,
        read
    )
}
