#[derive(Debug, Clone, PartialEq)]
pub enum ShardgateMode {
    Directory,
    Gateway,
    MapServer,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gateway_id: String,
    pub directory_url: String,
    pub account_url: String,
    /// Base URL other services use to reach this gateway's internal kick endpoint.
    pub kick_url: String,
    pub token_secret: String,
}

#[derive(Debug, Clone)]
pub struct MapServerConfig {
    pub server_id: String,
    pub name: String,
    pub directory_url: String,
    /// Address handed to clients for game traffic, not the HTTP health port.
    pub host: String,
    pub game_port: u16,
    pub supported_maps: Vec<i64>,
    pub max_players: i64,
    pub heartbeat_interval_secs: u64,
}

pub struct Config {
    pub port: u16,
    pub mode: ShardgateMode,
    pub token_ttl_secs: u64,
    pub gateway: Option<GatewayConfig>,
    pub map_server: Option<MapServerConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        let mode = match std::env::var("SHARDGATE_MODE")
            .unwrap_or_else(|_| "directory".to_string())
            .to_lowercase()
            .as_str()
        {
            "gateway" => ShardgateMode::Gateway,
            "mapserver" => ShardgateMode::MapServer,
            _ => ShardgateMode::Directory,
        };

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(7300);

        let gateway = if mode == ShardgateMode::Gateway {
            let gateway_id =
                std::env::var("SHARDGATE_GATEWAY_ID").unwrap_or_else(|_| "gateway-1".to_string());
            let directory_url = std::env::var("SHARDGATE_DIRECTORY_URL")
                .unwrap_or_else(|_| "http://localhost:7300".to_string());
            let account_url = std::env::var("SHARDGATE_ACCOUNT_URL")
                .unwrap_or_else(|_| "http://localhost:7310".to_string());
            let kick_url = std::env::var("SHARDGATE_KICK_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}"));
            let token_secret = std::env::var("SHARDGATE_TOKEN_SECRET")
                .expect("SHARDGATE_TOKEN_SECRET is required in gateway mode");

            Some(GatewayConfig {
                gateway_id,
                directory_url,
                account_url,
                kick_url,
                token_secret,
            })
        } else {
            None
        };

        let map_server = if mode == ShardgateMode::MapServer {
            let server_id = std::env::var("SHARDGATE_SERVER_ID")
                .expect("SHARDGATE_SERVER_ID is required in mapserver mode");
            let name = std::env::var("SHARDGATE_SERVER_NAME").unwrap_or_else(|_| server_id.clone());
            let directory_url = std::env::var("SHARDGATE_DIRECTORY_URL")
                .unwrap_or_else(|_| "http://localhost:7300".to_string());
            let host = std::env::var("SHARDGATE_SERVER_HOST")
                .expect("SHARDGATE_SERVER_HOST is required in mapserver mode");
            let game_port: u16 = std::env::var("SHARDGATE_GAME_PORT")
                .expect("SHARDGATE_GAME_PORT is required in mapserver mode")
                .parse()
                .expect("SHARDGATE_GAME_PORT must be a valid port number");
            let supported_maps: Vec<i64> = std::env::var("SHARDGATE_SUPPORTED_MAPS")
                .expect("SHARDGATE_SUPPORTED_MAPS is required in mapserver mode")
                .split(',')
                .map(|m| {
                    m.trim()
                        .parse()
                        .expect("SHARDGATE_SUPPORTED_MAPS must be comma-separated map ids")
                })
                .collect();
            let max_players: i64 = std::env::var("SHARDGATE_MAX_PLAYERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500);
            let heartbeat_interval_secs: u64 = std::env::var("SHARDGATE_HEARTBEAT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10);

            Some(MapServerConfig {
                server_id,
                name,
                directory_url,
                host,
                game_port,
                supported_maps,
                max_players,
                heartbeat_interval_secs,
            })
        } else {
            None
        };

        Self {
            port,
            mode,
            token_ttl_secs: std::env::var("SHARDGATE_TOKEN_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            gateway,
            map_server,
        }
    }
}
