use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::DEFAULT_SERVER_PORT;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::ServerApiPort => &vars.server_api_port,
        Var::AdminToken => &vars.admin_token,
        Var::GatewayToken => &vars.gateway_token,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: String,
    pub server_api_port: String,
    pub admin_token: String,
    pub gateway_token: String,
    /// Empty when no OTLP collector is configured; telemetry then stays
    /// on the local fmt layer only.
    pub otel_exporter_otlp_endpoint: String,
    pub api_service_name: String,
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        // missing .env is fine; real deployments inject the environment
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            server_api_port: optional("SERVER_API_PORT")
                .unwrap_or_else(|| DEFAULT_SERVER_PORT.to_string()),
            admin_token: require("ADMIN_TOKEN")?,
            gateway_token: require("GATEWAY_TOKEN")?,
            otel_exporter_otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_default(),
            api_service_name: optional("API_SERVICE_NAME")
                .unwrap_or_else(|| "battlepass-api".to_string()),
            api_tracer_name: optional("API_TRACER_NAME")
                .unwrap_or_else(|| "battlepass".to_string()),
        })
    }
}

fn require(key: &'static str) -> EnvResult<String> {
    std::env::var(key).map_err(|_| EnvErr::MissingValue(key))
}

fn optional(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    ServerApiPort,
    AdminToken,
    GatewayToken,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing required environment variable '{0}'")]
    MissingValue(&'static str),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_optional_filters_empty() {
        // SAFETY: test-local variable name, no other test touches it
        unsafe { std::env::set_var("BATTLEPASS_TEST_EMPTY", "") };
        assert!(optional("BATTLEPASS_TEST_EMPTY").is_none());

        unsafe { std::env::set_var("BATTLEPASS_TEST_SET", "value") };
        assert_eq!(optional("BATTLEPASS_TEST_SET").as_deref(), Some("value"));
    }

    #[test]
    fn test_require_reports_key() {
        let err = require("BATTLEPASS_TEST_NEVER_SET").unwrap_err();
        assert!(matches!(err, EnvErr::MissingValue("BATTLEPASS_TEST_NEVER_SET")));
    }
}
