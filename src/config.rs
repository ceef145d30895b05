use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub alipay: AlipayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlipayConfig {
    pub app_id: String,
    /// 应用私钥，PEM 或去掉头尾的 base64 均可
    pub private_key: String,
    /// 支付宝公钥，用于验签
    pub alipay_public_key: String,
    #[serde(default = "default_alipay_gateway")]
    pub gateway: String,
    pub notify_url: String,
    #[serde(default)]
    pub return_url: Option<String>,
}

fn default_alipay_gateway() -> String {
    "https://openapi.alipay.com/gateway.do".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub public_base_url: String,
    pub max_file_size: usize, // bytes
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "./uploads".to_string(),
            public_base_url: "/uploads".to_string(),
            max_file_size: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;

                let storage_defaults = StorageConfig::default();

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    alipay: AlipayConfig {
                        app_id: get_env("ALIPAY_APP_ID").unwrap_or_default(),
                        private_key: get_env("ALIPAY_PRIVATE_KEY").unwrap_or_default(),
                        alipay_public_key: get_env("ALIPAY_PUBLIC_KEY").unwrap_or_default(),
                        gateway: get_env("ALIPAY_GATEWAY").unwrap_or_else(default_alipay_gateway),
                        notify_url: get_env("ALIPAY_NOTIFY_URL").unwrap_or_default(),
                        return_url: get_env("ALIPAY_RETURN_URL"),
                    },
                    storage: StorageConfig {
                        upload_dir: get_env("STORAGE_UPLOAD_DIR")
                            .unwrap_or(storage_defaults.upload_dir),
                        public_base_url: get_env("STORAGE_PUBLIC_BASE_URL")
                            .unwrap_or(storage_defaults.public_base_url),
                        max_file_size: get_env_parse(
                            "STORAGE_MAX_FILE_SIZE",
                            storage_defaults.max_file_size,
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.refresh_token_expires_in = n;
        }

        // Alipay
        if let Ok(v) = env::var("ALIPAY_APP_ID") {
            config.alipay.app_id = v;
        }
        if let Ok(v) = env::var("ALIPAY_PRIVATE_KEY") {
            config.alipay.private_key = v;
        }
        if let Ok(v) = env::var("ALIPAY_PUBLIC_KEY") {
            config.alipay.alipay_public_key = v;
        }
        if let Ok(v) = env::var("ALIPAY_GATEWAY") {
            config.alipay.gateway = v;
        }
        if let Ok(v) = env::var("ALIPAY_NOTIFY_URL") {
            config.alipay.notify_url = v;
        }
        if let Ok(v) = env::var("ALIPAY_RETURN_URL") {
            config.alipay.return_url = Some(v);
        }

        // Storage
        if let Ok(v) = env::var("STORAGE_UPLOAD_DIR") {
            config.storage.upload_dir = v;
        }
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            config.storage.public_base_url = v;
        }
        if let Ok(v) = env::var("STORAGE_MAX_FILE_SIZE")
            && let Ok(n) = v.parse()
        {
            config.storage.max_file_size = n;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_toml() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 3001

            [database]
            url = "postgres://localhost/aifans"
            max_connections = 5

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400

            [alipay]
            app_id = "2021000000000000"
            private_key = "key"
            alipay_public_key = "pub"
            notify_url = "https://example.com/api/payments/alipay/notify"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.alipay.gateway, "https://openapi.alipay.com/gateway.do");
        assert!(config.alipay.return_url.is_none());
        // storage 段缺省时使用默认值
        assert_eq!(config.storage.upload_dir, "./uploads");
        assert_eq!(config.storage.max_file_size, 20 * 1024 * 1024);
    }
}
