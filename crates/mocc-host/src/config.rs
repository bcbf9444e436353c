//! Service settings, read from flags or the environment.

use clap::Args;

/// Endpoints and credentials for every backing service.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Cosmos DB account endpoint
    #[arg(long, env = "COSMOS_URL")]
    pub cosmos_url: String,

    /// Cosmos DB account key (managed identity is used when absent)
    #[arg(long, env = "COSMOS_KEY", hide_env_values = true)]
    pub cosmos_key: Option<String>,

    /// Database holding the application containers
    #[arg(long, env = "COSMOS_DATABASE", default_value = "mocc-db")]
    pub cosmos_database: String,

    /// Azure OpenAI endpoint; also the default for the other cognitive services
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub openai_endpoint: String,

    /// Chat model deployment name
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT", default_value = "gpt-4o-mini")]
    pub openai_deployment: String,

    /// Chat completions API version
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = "2024-06-01")]
    pub openai_api_version: String,

    /// Document Intelligence endpoint
    #[arg(long, env = "DOCUMENT_INTELLIGENCE_ENDPOINT")]
    pub document_intelligence_endpoint: Option<String>,

    /// Content Safety endpoint
    #[arg(long, env = "CONTENT_SAFETY_ENDPOINT")]
    pub content_safety_endpoint: Option<String>,

    /// Key Vault holding the notification hub secrets (environment variables otherwise)
    #[arg(long, env = "KEY_VAULT_URL")]
    pub key_vault_url: Option<String>,

    /// Default storage account
    #[arg(long, env = "STORAGE_ACCOUNT_NAME", default_value = "moccstorage")]
    pub storage_account_name: String,

    /// SignalR Service endpoint for server-side sends
    #[arg(
        long,
        env = "SIGNALR_ENDPOINT",
        default_value = "https://moccsignalr.service.signalr.net"
    )]
    pub signalr_endpoint: String,

    /// SignalR hub name
    #[arg(long, env = "SIGNALR_HUB", default_value = "updates")]
    pub signalr_hub: String,

    /// SignalR connection string; its access key signs client tokens
    #[arg(long, env = "AZURE_SIGNALR_CONNECTION_STRING", hide_env_values = true)]
    pub signalr_connection_string: Option<String>,

    /// Pre-issued bearer token used instead of managed identity
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Client id of a user-assigned managed identity
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub managed_identity_client_id: Option<String>,

    /// App Service identity endpoint
    #[arg(long, env = "IDENTITY_ENDPOINT")]
    pub identity_endpoint: Option<String>,

    /// App Service identity header
    #[arg(long, env = "IDENTITY_HEADER", hide_env_values = true)]
    pub identity_header: Option<String>,
}

impl Settings {
    pub fn document_intelligence_endpoint(&self) -> &str {
        self.document_intelligence_endpoint
            .as_deref()
            .unwrap_or(&self.openai_endpoint)
    }

    pub fn content_safety_endpoint(&self) -> &str {
        self.content_safety_endpoint
            .as_deref()
            .unwrap_or(&self.openai_endpoint)
    }

    pub fn storage_account_url(&self) -> String {
        format!("https://{}.blob.core.windows.net", self.storage_account_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["mocc"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().settings
    }

    #[test]
    fn defaults_and_fallbacks() {
        let settings = parse(&[
            "--cosmos-url",
            "https://db.documents.azure.com",
            "--openai-endpoint",
            "https://ai.openai.azure.com",
        ]);

        assert_eq!(settings.cosmos_database, "mocc-db");
        assert_eq!(settings.openai_deployment, "gpt-4o-mini");
        assert_eq!(settings.signalr_hub, "updates");
        assert_eq!(settings.document_intelligence_endpoint(), "https://ai.openai.azure.com");
        assert_eq!(settings.content_safety_endpoint(), "https://ai.openai.azure.com");
        assert_eq!(
            settings.storage_account_url(),
            "https://moccstorage.blob.core.windows.net"
        );
    }

    #[test]
    fn explicit_endpoints_win() {
        let settings = parse(&[
            "--cosmos-url",
            "https://db",
            "--openai-endpoint",
            "https://ai",
            "--document-intelligence-endpoint",
            "https://di",
            "--content-safety-endpoint",
            "https://cs",
        ]);
        assert_eq!(settings.document_intelligence_endpoint(), "https://di");
        assert_eq!(settings.content_safety_endpoint(), "https://cs");
    }
}
