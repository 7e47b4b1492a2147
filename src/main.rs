use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cvms_trigger::config::{
    Config, ConnectorSettings, FileConfig, log_level_directive, parse_flag,
};
use cvms_trigger::connectors::ToolFilter;
use cvms_trigger::model::{DEFAULT_TAG_KEY, ProjectRef};
use cvms_trigger::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "cvms-trigger")]
#[command(about = "CVMS collector triggerer", long_about = None)]
#[command(version)]
struct Cli {
    /// CVMS URL
    #[arg(long)]
    url: String,

    /// Api-key for CVMS
    #[arg(long, env = "CVMS_API_KEY", hide_env_values = true)]
    apikey: String,

    /// Repository (project) name
    #[arg(long)]
    repository: String,

    /// Comma separated collector types, e.g. "Black Duck Hub,Polaris", or ALL
    #[arg(long, alias = "collector_type")]
    collector_type: String,

    /// Only run the collector with this name
    #[arg(long, alias = "collector_name", default_value = "")]
    collector_name: String,

    /// Wait until the data import is done
    #[arg(long, alias = "wait_analysis", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    wait_analysis: bool,

    /// Report file to send for analysis instead of triggering collectors
    #[arg(long, default_value = "")]
    filename: String,

    /// Metadata tag used to find the project
    #[arg(long, default_value = DEFAULT_TAG_KEY)]
    tag: String,

    /// Create the project when it does not exist
    #[arg(long, alias = "create_project_if_not_exists", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    create_project_if_not_exists: bool,

    /// Create the requested collectors when none exist
    #[arg(long, alias = "create_connector_if_not_exists", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    create_connector_if_not_exists: bool,

    /// Server URL of the tool new collectors connect to
    #[arg(long, alias = "connector_url")]
    connector_url: Option<String>,

    /// Username for new collectors
    #[arg(long, alias = "connector_username")]
    connector_username: Option<String>,

    /// Password for new collectors
    #[arg(long, alias = "connector_password", env = "CVMS_CONNECTOR_PASSWORD", hide_env_values = true)]
    connector_password: Option<String>,

    /// API or access token for new collectors
    #[arg(long, alias = "connector_token", env = "CVMS_CONNECTOR_TOKEN", hide_env_values = true)]
    connector_token: Option<String>,

    /// Account email for new collectors
    #[arg(long, alias = "connector_email")]
    connector_email: Option<String>,

    /// Branch or stream name in the tool
    #[arg(long)]
    branch: Option<String>,

    /// Application name, used as the component label
    #[arg(long)]
    application: Option<String>,

    /// TOML file with [poll] and [connector] settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (INFO or DEBUG)
    #[arg(long, alias = "log_level", default_value = "INFO")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<Config> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let overrides = ConnectorSettings {
            server_url: self.connector_url,
            username: self.connector_username,
            password: self.connector_password,
            api_token: self.connector_token,
            email: self.connector_email,
            branch: self.branch,
            application: self.application,
        };

        Ok(Config {
            url: self.url,
            api_key: self.apikey,
            project: ProjectRef::new(self.repository).with_tag_key(self.tag),
            collector_types: ToolFilter::parse(&self.collector_type),
            collector_name: Some(self.collector_name).filter(|n| !n.is_empty()),
            wait_for_analysis: self.wait_analysis,
            file: Some(self.filename)
                .filter(|f| !f.is_empty())
                .map(PathBuf::from),
            create_project_if_missing: self.create_project_if_not_exists,
            create_connectors_if_missing: self.create_connector_if_not_exists,
            connector: file.connector.merge(overrides),
            poll: file.poll,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let directive = log_level_directive(&cli.log_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("CVMS utility version: {}", env!("CARGO_PKG_VERSION"));

    match cli.into_config() {
        Ok(config) => {
            // A panic inside the run must still end with the done marker
            if let Err(e) = tokio::spawn(run(config)).await {
                tracing::error!("Run aborted unexpectedly: {}", e);
            }
        }
        Err(e) => tracing::error!("{:#}", e),
    }

    tracing::info!("---done!");
    ExitCode::SUCCESS
}

async fn run(config: Config) {
    config.log_settings();

    let orchestrator = match Orchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {:#}", e);
            return;
        }
    };

    match orchestrator.run().await {
        Ok(summary) => tracing::debug!(
            "Run finished: project {:?}, {} job(s) started",
            summary.project.as_ref().map(|p| p.as_str()),
            summary.jobs.len()
        ),
        Err(e) => tracing::error!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "cvms-trigger",
            "--url",
            "https://cvms.example.com",
            "--apikey",
            "key-123",
            "--repository",
            "app-1",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_minimal_arguments() {
        let config = parse(&["--collector-type", "ALL"]).into_config().unwrap();
        assert_eq!(config.collector_types, ToolFilter::All);
        assert_eq!(config.project.tag_key, "integration_name");
        assert_eq!(config.collector_name, None);
        assert_eq!(config.file, None);
        assert!(!config.wait_for_analysis);
        assert!(!config.create_project_if_missing);
        assert_eq!(config.poll.interval_secs, 4);
    }

    #[test]
    fn test_underscore_aliases_and_flag_values() {
        let config = parse(&[
            "--collector_type",
            "Polaris,Coverity",
            "--collector_name",
            "main",
            "--wait_analysis",
            "True",
            "--create_project_if_not_exists",
            "yes",
            "--filename",
            "/tmp/report.xml",
        ])
        .into_config()
        .unwrap();
        assert_eq!(
            config.collector_types,
            ToolFilter::Tools(vec!["Polaris".to_string(), "Coverity".to_string()])
        );
        assert_eq!(config.collector_name.as_deref(), Some("main"));
        assert!(config.wait_for_analysis);
        assert!(config.create_project_if_missing);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/report.xml")));
    }

    #[test]
    fn test_collector_type_is_required() {
        let result = Cli::try_parse_from([
            "cvms-trigger",
            "--url",
            "u",
            "--apikey",
            "k",
            "--repository",
            "r",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_connector_arguments_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cvms.toml");
        std::fs::write(
            &path,
            "[poll]\ninterval_secs = 2\n\n[connector]\nserver_url = \"https://file\"\nusername = \"svc\"\n",
        )
        .unwrap();

        let config = parse(&[
            "--collector-type",
            "Coverity",
            "--config",
            path.to_str().unwrap(),
            "--connector-url",
            "https://cli",
            "--branch",
            "main",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.connector.server_url.as_deref(), Some("https://cli"));
        assert_eq!(config.connector.username.as_deref(), Some("svc"));
        assert_eq!(config.connector.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = parse(&["--collector-type", "ALL", "--config", "/nonexistent/cvms.toml"])
            .into_config();
        assert!(result.is_err());
    }
}
