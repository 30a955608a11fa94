use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use caas_k8s::{AppSpec, KubeClient, ResourceLimits, list_contexts};
use clap::{Parser, Subcommand};

mod settings;

use settings::Settings;

/// caas - Kubernetes control client for the Container-as-a-Service backend
#[derive(Parser, Debug)]
#[command(name = "caas")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to ~/.config/caas/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Use the in-cluster service account instead of a kubeconfig
    #[arg(long, global = true, conflicts_with = "context")]
    in_cluster: bool,

    /// Log level directive (e.g. "info", "caas_k8s=debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List kubeconfig contexts
    Contexts,

    /// Manage tenant namespaces
    #[command(subcommand)]
    Namespace(NamespaceCommand),

    /// Create the deployment, service and ingress for an app
    Deploy(DeployArgs),

    /// Remove an app's ingress, service and deployment
    Undeploy {
        namespace: String,
        name: String,
    },

    /// List pods, optionally filtered by label selector
    Pods {
        namespace: String,
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },

    /// Print pod logs
    Logs {
        namespace: String,
        pod: String,
        /// Number of trailing lines to fetch
        #[arg(long, default_value = "100")]
        tail_lines: i64,
    },

    /// Print current CPU (millicores) and memory (bytes) of a pod as JSON
    Metrics { namespace: String, pod: String },

    /// Print summed usage of all pods of an app as JSON
    Usage { namespace: String, app: String },
}

#[derive(Subcommand, Debug)]
enum NamespaceCommand {
    Create { name: String },
    Delete { name: String },
    List,
}

#[derive(clap::Args, Debug)]
struct DeployArgs {
    namespace: String,
    name: String,

    #[arg(long)]
    image: String,

    /// Port the container listens on
    #[arg(long, default_value = "8080")]
    port: i32,

    #[arg(long, default_value = "1")]
    replicas: i32,

    /// Environment variable as KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Public host name; an ingress is created only when set
    #[arg(long)]
    host: Option<String>,

    /// CPU limit, e.g. "500m"
    #[arg(long)]
    cpu_limit: Option<String>,

    /// Memory limit, e.g. "256Mi"
    #[arg(long)]
    memory_limit: Option<String>,
}

impl DeployArgs {
    fn app_spec(self) -> AppSpec {
        let mut app = AppSpec::new(self.name, self.image, self.port)
            .with_replicas(self.replicas)
            .with_limits(ResourceLimits {
                cpu: self.cpu_limit,
                memory: self.memory_limit,
            });
        app.env = self.env;
        app.host = self.host;
        app
    }
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match start(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?.with_overrides(
        args.context.clone(),
        args.in_cluster,
        args.log_level.clone(),
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(settings = ?settings, "loaded settings");

    run(args.command, &settings).await
}

async fn run(command: Command, settings: &Settings) -> Result<()> {
    if let Command::Contexts = command {
        for ctx in list_contexts()? {
            let marker = if ctx.is_current { "*" } else { " " };
            println!(
                "{} {}\t{}\t{}\t{}",
                marker,
                ctx.name,
                ctx.cluster,
                ctx.user,
                ctx.namespace.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    let client = KubeClient::connect(&settings.cluster_source(), &settings.client_options())
        .await
        .context("Failed to connect to the cluster")?
        .with_ingress_options(settings.ingress_options());

    match command {
        Command::Contexts => {}
        Command::Namespace(NamespaceCommand::Create { name }) => {
            client.create_namespace(&name).await?;
            println!("namespace/{} created", name);
        }
        Command::Namespace(NamespaceCommand::Delete { name }) => {
            client.delete_namespace(&name).await?;
            println!("namespace/{} deleted", name);
        }
        Command::Namespace(NamespaceCommand::List) => {
            for ns in client.list_namespaces().await {
                println!("{}\t{}", ns.name, ns.status);
            }
        }
        Command::Deploy(deploy) => {
            let namespace = deploy.namespace.clone();
            let app = deploy.app_spec();
            client.deploy_app(&namespace, &app).await?;
            match &app.host {
                Some(host) => println!("{} deployed to {} at {}", app.name, namespace, host),
                None => println!("{} deployed to {}", app.name, namespace),
            }
        }
        Command::Undeploy { namespace, name } => {
            client.undeploy_app(&namespace, &name).await?;
            println!("{} removed from {}", name, namespace);
        }
        Command::Pods {
            namespace,
            selector,
        } => {
            for pod in client.list_pods(&namespace, selector.as_deref()).await {
                println!(
                    "{}\t{}\t{:?}\t{}\t{}",
                    pod.name,
                    pod.ready_status(),
                    pod.status,
                    pod.restarts(),
                    pod.node_name.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Logs {
            namespace,
            pod,
            tail_lines,
        } => {
            print!("{}", client.pod_logs(&namespace, &pod, Some(tail_lines)).await);
        }
        Command::Metrics { namespace, pod } => {
            let usage = client.pod_metrics(&namespace, &pod).await;
            println!("{}", serde_json::to_string_pretty(&usage)?);
        }
        Command::Usage { namespace, app } => {
            let usage = client.app_usage(&namespace, &app).await;
            println!("{}", serde_json::to_string_pretty(&usage)?);
        }
    }

    Ok(())
}
