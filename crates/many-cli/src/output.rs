//! Output formatting for CLI results
//!
//! Three output formats are supported:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use many_client::modules::account::{AccountFeature, AccountInfo};
use many_client::modules::kvstore::KvStoreInfo;
use many_identity::cbor::Value;

use crate::value;
use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Formats output for different modes
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    pub fn format_identity(&self, info: &IdentityOutput) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Address", &info.address]);
                table.add_row(vec!["Public Key", info.public_key.as_deref().unwrap_or("-")]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(info, "id"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// The value returned by a raw call. `None` means the server sent nothing.
    pub fn format_value(&self, value: Option<&Value>, command: &str) -> String {
        match self.format {
            OutputFormat::Table => match value {
                Some(v) => value::to_diagnostic(v),
                None => "(no result)".to_string(),
            },
            OutputFormat::Json => {
                let json = value.map(value::to_json).unwrap_or(serde_json::Value::Null);
                self.to_json_response(&json, command)
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_kv_info(&self, info: &KvStoreInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Hash", &info.hash]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&KvInfoOutput { hash: &info.hash }, "kv info"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_kv_value(&self, key: &[u8], value: Option<&[u8]>) -> String {
        match self.format {
            OutputFormat::Table => match value {
                Some(v) => match std::str::from_utf8(v) {
                    Ok(text) => text.to_string(),
                    Err(_) => hex::encode(v),
                },
                None => "(not found)".to_string(),
            },
            OutputFormat::Json => self.to_json_response(
                &KvValueOutput {
                    key: hex::encode(key),
                    value: value.map(hex::encode),
                },
                "kv get",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_account(&self, address: &str, info: &AccountInfo) -> String {
        let output = AccountOutput::new(address, info);
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Account", address]);
                table.add_row(vec!["Name", info.name.as_deref().unwrap_or("-")]);
                let roles: Vec<String> = output
                    .roles
                    .iter()
                    .map(|r| format!("{}: {}", r.address, r.roles.join(", ")))
                    .collect();
                table.add_row(vec!["Roles", &roles.join("\n")]);
                table.add_row(vec!["Features", &output.features.join(", ")]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&output, "account info"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Plain confirmation line for commands without a payload.
    pub fn format_done(&self, message: &str, command: &str) -> String {
        match self.format {
            OutputFormat::Table => format!("✓ {message}"),
            OutputFormat::Json => self.to_json_response(&serde_json::Value::Null, command),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_error_with_code(&self, error: &dyn std::fmt::Display, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => {
                // Server errors already render with the prefix.
                let text = error.to_string();
                if text.starts_with("Error: ") {
                    text
                } else {
                    format!("Error: {text}")
                }
            }
            OutputFormat::Json => {
                let response = JsonResponse::<()>::error(&error.to_string());
                let mut output = serde_json::to_value(&response).unwrap_or_default();
                output["exit_code"] = serde_json::json!(code as i32);
                output["exit_code_name"] = serde_json::json!(code.name());
                self.to_json(&output)
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message, only shown in verbose mode
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }
}

fn property_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table
}

#[derive(Debug, Serialize)]
pub struct IdentityOutput {
    pub address: String,
    pub public_key: Option<String>,
}

#[derive(Serialize)]
struct KvInfoOutput<'a> {
    hash: &'a str,
}

#[derive(Serialize)]
struct KvValueOutput {
    key: String,
    value: Option<String>,
}

#[derive(Serialize)]
struct RoleOutput {
    address: String,
    roles: Vec<String>,
}

#[derive(Serialize)]
struct AccountOutput {
    address: String,
    name: Option<String>,
    roles: Vec<RoleOutput>,
    features: Vec<String>,
}

impl AccountOutput {
    fn new(address: &str, info: &AccountInfo) -> Self {
        Self {
            address: address.to_string(),
            name: info.name.clone(),
            roles: info
                .roles
                .iter()
                .map(|(addr, roles)| RoleOutput {
                    address: addr.to_string(),
                    roles: roles.clone(),
                })
                .collect(),
            features: info.features.iter().map(feature_name).collect(),
        }
    }
}

fn feature_name(feature: &AccountFeature) -> String {
    match feature {
        AccountFeature::Ledger => "ledger".to_string(),
        AccountFeature::Multisig(args) => {
            let mut parts = Vec::new();
            if let Some(t) = args.threshold {
                parts.push(format!("threshold={t}"));
            }
            if let Some(t) = args.timeout_in_secs {
                parts.push(format!("timeout={t}s"));
            }
            if let Some(e) = args.execute_automatically {
                parts.push(format!("auto={e}"));
            }
            if parts.is_empty() {
                "multisig".to_string()
            } else {
                format!("multisig({})", parts.join(", "))
            }
        }
    }
}
