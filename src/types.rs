use crate::command::CommandAdapter;
use crate::config::{
    DEFAULT_CAPACITY_PER_BUCKET, DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_MAX_ITEM_LEN,
    DEFAULT_NUM_BUCKETS, FilterConfig, FilterConfigBuilder,
};
use crate::error::{FilterError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InsertRequest {
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AdvanceTimeRequest {
    /// Number of buckets to move forward, defaults to 1
    pub delta: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetTimeRequest {
    pub time: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub exists: bool,
}

/// Integer result of a mutating command: 1 when applied, 0 when the key is unknown
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommandResponse {
    pub result: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

pub struct AppState {
    pub adapter: CommandAdapter,
}

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct ServerConfig {
    #[builder(default = "\"127.0.0.1\".to_string()")]
    pub server_host: String,
    #[builder(default = "3000")]
    pub http_port: u16,
    #[builder(default = "6380")]
    pub resp_port: u16,
    #[builder(default = "DEFAULT_CAPACITY_PER_BUCKET")]
    pub bloom_capacity_per_bucket: usize,
    #[builder(default = "DEFAULT_FALSE_POSITIVE_RATE")]
    pub bloom_false_positive_rate: f64,
    #[builder(default = "DEFAULT_NUM_BUCKETS")]
    pub bloom_num_buckets: usize,
    #[builder(default = "DEFAULT_MAX_ITEM_LEN")]
    pub bloom_max_item_len: usize,
}

fn env_or<T>(var_name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var_name) {
        Ok(value) => value.parse().map_err(|e: T::Err| FilterError::EnvParseError {
            var_name: var_name.to_string(),
            value,
            error: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env_or("SERVER_HOST", "127.0.0.1".to_string())?,
            http_port: env_or("HTTP_PORT", 3000)?,
            resp_port: env_or("RESP_PORT", 6380)?,
            bloom_capacity_per_bucket: env_or(
                "BLOOM_CAPACITY_PER_BUCKET",
                DEFAULT_CAPACITY_PER_BUCKET,
            )?,
            bloom_false_positive_rate: env_or(
                "BLOOM_FALSE_POSITIVE_RATE",
                DEFAULT_FALSE_POSITIVE_RATE,
            )?,
            bloom_num_buckets: env_or("BLOOM_NUM_BUCKETS", DEFAULT_NUM_BUCKETS)?,
            bloom_max_item_len: env_or("BLOOM_MAX_ITEM_LEN", DEFAULT_MAX_ITEM_LEN)?,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.http_port)
    }

    pub fn resp_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.resp_port)
    }

    pub fn filter_config(&self) -> Result<FilterConfig> {
        let config = FilterConfigBuilder::default()
            .capacity_per_bucket(self.bloom_capacity_per_bucket)
            .false_positive_rate(self.bloom_false_positive_rate)
            .num_buckets(self.bloom_num_buckets)
            .max_item_len(self.bloom_max_item_len)
            .build()
            .map_err(|e| FilterError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
