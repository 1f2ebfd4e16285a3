use crate::error::{Error, Result};
use crate::services::intake_service::DEFAULT_CLAIM_LEASE_SECS;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsappProvider {
    Twilio,
    Cloud,
}

/// Optional intake steps between APPLY and the CV upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntakeField {
    FullName,
    Email,
    Phone,
    CoverLetter,
}

impl IntakeField {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "name" | "full_name" => Ok(IntakeField::FullName),
            "email" => Ok(IntakeField::Email),
            "phone" | "phone_number" => Ok(IntakeField::Phone),
            "cover_letter" => Ok(IntakeField::CoverLetter),
            other => Err(Error::Config(format!("Unknown intake field: {}", other))),
        }
    }
}

/// Parses a comma separated field list. The result is always in dialogue
/// order (name, email, phone, cover letter) regardless of input order.
pub fn parse_intake_fields(raw: &str) -> Result<Vec<IntakeField>> {
    let mut fields = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(IntakeField::parse)
        .collect::<Result<Vec<_>>>()?;
    fields.sort();
    fields.dedup();
    Ok(fields)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub admin_api_key: String,
    pub whatsapp_provider: WhatsappProvider,
    pub whatsapp_verify_token: String,
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_number: String,
    pub graph_api_base: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_whatsapp_from: String,
    pub twilio_api_base: String,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: Option<String>,
    pub uploads_dir: String,
    pub intake_fields: Vec<IntakeField>,
    pub deadline_sweep_secs: u64,
    pub message_claim_lease_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let whatsapp_provider = match get_env_or("WHATSAPP_PROVIDER", "twilio").to_lowercase().as_str() {
            "twilio" => WhatsappProvider::Twilio,
            "cloud" | "graph" => WhatsappProvider::Cloud,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for WHATSAPP_PROVIDER: {}",
                    other
                )))
            }
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            admin_api_key: get_env("ADMIN_API_KEY")?,
            whatsapp_provider,
            whatsapp_verify_token: get_env_or("WHATSAPP_VERIFY_TOKEN", "change-me"),
            whatsapp_access_token: get_env_opt("WHATSAPP_ACCESS_TOKEN"),
            whatsapp_phone_number_id: get_env_opt("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_number: get_env_or("WHATSAPP_NUMBER", "+1234567890"),
            graph_api_base: get_env_or("GRAPH_API_BASE", "https://graph.facebook.com/v17.0"),
            twilio_account_sid: get_env_opt("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: get_env_opt("TWILIO_AUTH_TOKEN"),
            twilio_whatsapp_from: get_env_or("TWILIO_WHATSAPP_FROM", "whatsapp:+14155238886"),
            twilio_api_base: get_env_or("TWILIO_API_BASE", "https://api.twilio.com/2010-04-01"),
            mail_api_url: get_env_opt("MAIL_API_URL"),
            mail_api_key: get_env_opt("MAIL_API_KEY"),
            mail_from: get_env_opt("MAIL_FROM"),
            uploads_dir: get_env_or("UPLOADS_DIR", "./uploads"),
            intake_fields: parse_intake_fields(&get_env_or("INTAKE_FIELDS", "name,email"))?,
            deadline_sweep_secs: get_env_parse_or("DEADLINE_SWEEP_SECS", 60)?,
            message_claim_lease_secs: get_env_parse_or("MESSAGE_CLAIM_LEASE_SECS", DEFAULT_CLAIM_LEASE_SECS)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_env_opt(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}
