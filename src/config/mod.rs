use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Azure OpenAI API key. Without it the stub generator is used.
    pub azure_api_key: Option<String>,

    /// Azure OpenAI resource endpoint, e.g. "https://my-resource.openai.azure.com"
    pub azure_api_endpoint: Option<String>,

    /// Azure OpenAI chat deployment name
    pub azure_deployment: Option<String>,

    #[serde(default = "default_api_version")]
    pub azure_api_version: String,

    /// Mermaid CLI used to validate generated diagrams
    #[serde(default = "default_mmdc_path")]
    pub mmdc_path: String,

    /// Largest accepted source submission, in bytes
    #[serde(default = "default_max_code_bytes")]
    pub max_code_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_mmdc_path() -> String {
    "mmdc".to_string()
}

fn default_max_code_bytes() -> usize {
    100_000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build a config from explicit key/value pairs, ignoring the process
    /// environment and any `.env` file.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
    }

    /// Largest request body accepted: room for JSON-escaped code plus the
    /// envelope, clamped instead of overflowing for huge limits.
    pub fn body_limit(&self) -> usize {
        self.max_code_bytes.saturating_mul(2).saturating_add(1024)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::from_pairs(std::iter::empty::<(String, String)>()).expect("defaults are complete")
    }
}
