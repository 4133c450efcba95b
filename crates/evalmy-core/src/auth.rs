//! Credential bundles forwarded to the scoring service.
//!
//! The service runs its judgements on the caller's own LLM deployment, so
//! every task carries the caller's OpenAI or Azure OpenAI credentials. The
//! bundle is serialized as-is into the `auth` field of each request.
//!
//! Deserialized bundles only take a typed variant when they carry exactly
//! that variant's keys. Anything richer stays [`Auth::Custom`] so no field
//! is lost on the way to the service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// LLM credentials passed through to the scoring service.
#[derive(Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Auth {
    /// Azure OpenAI deployment
    Azure {
        api_key: String,
        azure_endpoint: String,
        api_version: String,
        azure_deployment: String,
    },
    /// OpenAI API key and model name
    OpenAi { api_key: String, model: String },
    /// Any other bundle the service understands
    Custom(Value),
}

impl Auth {
    pub fn open_ai(api_key: &str, model: &str) -> Self {
        Auth::OpenAi {
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn azure(api_key: &str, azure_endpoint: &str, api_version: &str, azure_deployment: &str) -> Self {
        Auth::Azure {
            api_key: api_key.to_string(),
            azure_endpoint: azure_endpoint.to_string(),
            api_version: api_version.to_string(),
            azure_deployment: azure_deployment.to_string(),
        }
    }

    /// Classify a raw bundle without dropping any of its fields.
    pub fn from_value(value: Value) -> Self {
        if let Ok(AzureFields {
            api_key,
            azure_endpoint,
            api_version,
            azure_deployment,
        }) = serde_json::from_value(value.clone())
        {
            return Auth::Azure {
                api_key,
                azure_endpoint,
                api_version,
                azure_deployment,
            };
        }
        if let Ok(OpenAiFields { api_key, model }) = serde_json::from_value(value.clone()) {
            return Auth::OpenAi { api_key, model };
        }
        Auth::Custom(value)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AzureFields {
    api_key: String,
    azure_endpoint: String,
    api_version: String,
    azure_deployment: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OpenAiFields {
    api_key: String,
    model: String,
}

impl<'de> Deserialize<'de> for Auth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Auth::from_value)
    }
}

// Keys never reach the logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Azure {
                azure_endpoint,
                api_version,
                azure_deployment,
                ..
            } => f
                .debug_struct("Azure")
                .field("api_key", &"<redacted>")
                .field("azure_endpoint", azure_endpoint)
                .field("api_version", api_version)
                .field("azure_deployment", azure_deployment)
                .finish(),
            Auth::OpenAi { model, .. } => f
                .debug_struct("OpenAi")
                .field("api_key", &"<redacted>")
                .field("model", model)
                .finish(),
            Auth::Custom(_) => f.write_str("Custom(<redacted>)"),
        }
    }
}
