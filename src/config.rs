use std::env;

/// Statement descriptors are cosmetic text on the buyer's card statement;
/// Stripe caps them at 22 (descriptor) and 12 (suffix) characters.
const STATEMENT_DESCRIPTOR_MAX: usize = 22;
const STATEMENT_SUFFIX_MAX: usize = 12;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub gateway: GatewaySettings,
}

/// Stripe credentials and options, resolved once at startup and passed by
/// reference through `AppState`. The live/test pair is selected here so the
/// rest of the code never has to care which mode it runs in.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub test_mode: bool,
    /// Secret key for outbound API calls (live or test, per `test_mode`)
    pub secret_key: String,
    /// Publishable key of the selected pair; unused server-side
    pub publishable_key: String,
    /// Shared secret authenticating inbound webhooks
    pub webhook_secret: String,
    pub statement_descriptor: Option<String>,
    pub statement_descriptor_suffix: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYGATE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "paygate.db".to_string()),
            base_url,
            dev_mode,
            gateway: GatewaySettings::from_env(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl GatewaySettings {
    pub fn from_env() -> Self {
        let test_mode = env::var("GATEWAY_TEST_MODE")
            .map(|v| v == "1" || v == "true" || v == "yes")
            .unwrap_or(true);

        let (secret_key, publishable_key) = if test_mode {
            (
                env::var("STRIPE_TEST_SECRET_KEY").unwrap_or_default(),
                env::var("STRIPE_TEST_PUBLISHABLE_KEY").unwrap_or_default(),
            )
        } else {
            (
                env::var("STRIPE_LIVE_SECRET_KEY").unwrap_or_default(),
                env::var("STRIPE_LIVE_PUBLISHABLE_KEY").unwrap_or_default(),
            )
        };

        Self {
            test_mode,
            secret_key,
            publishable_key,
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            statement_descriptor: env::var("STATEMENT_DESCRIPTOR").ok().filter(|s| !s.is_empty()),
            statement_descriptor_suffix: env::var("STATEMENT_DESCRIPTOR_SUFFIX")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    /// Validate the cosmetic statement descriptor settings. Called once at
    /// startup; invalid values abort the boot instead of failing a charge.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref descriptor) = self.statement_descriptor {
            check_descriptor(descriptor, STATEMENT_DESCRIPTOR_MAX, "statement descriptor")?;
        }
        if let Some(ref suffix) = self.statement_descriptor_suffix {
            check_descriptor(suffix, STATEMENT_SUFFIX_MAX, "statement descriptor suffix")?;
        }
        Ok(())
    }
}

fn check_descriptor(value: &str, max: usize, field: &str) -> Result<(), String> {
    if value.len() > max {
        return Err(format!("{} exceeds {} characters", field, max));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return Err(format!(
            "{} may only contain letters, digits, and spaces",
            field
        ));
    }
    Ok(())
}
