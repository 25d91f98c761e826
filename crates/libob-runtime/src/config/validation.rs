//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, ConnectionConfig, ImplConfig, LibObConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &LibObConfig) -> ConfigResult<()> {
    validate_impl_config(&config.implementation)?;
    validate_logging_config(&config.logging)?;
    validate_bots_config(&config.bots)?;
    for connection in &config.connections {
        validate_connection_config(connection)?;
    }
    #[cfg(feature = "http-server")]
    validate_event_buffers(&config.connections)?;
    Ok(())
}

fn validate_impl_config(config: &ImplConfig) -> ConfigResult<()> {
    if config.name.is_empty() {
        return Err(ConfigError::missing_field("implementation.name"));
    }
    if config.platform.is_empty() {
        return Err(ConfigError::missing_field("implementation.platform"));
    }
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_bots_config(bots: &[BotConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for bot in bots {
        if bot.platform.is_empty() {
            return Err(ConfigError::missing_field("bots.platform"));
        }
        if bot.user_id.is_empty() {
            return Err(ConfigError::missing_field("bots.user_id"));
        }
        let key = format!("{}.{}", bot.platform, bot.user_id);
        if !seen.insert(key.clone()) {
            return Err(ConfigError::validation(format!("Duplicate bot: {key}")));
        }
    }
    Ok(())
}

fn validate_connection_config(connection: &ConnectionConfig) -> ConfigResult<()> {
    match *connection {
        #[cfg(feature = "http-server")]
        ConnectionConfig::Http(ref config) => {
            validate_port(config.port)?;
            if config.event_enabled && config.event_buffer_size == 0 {
                return Err(ConfigError::validation(
                    "Event buffer size must be greater than 0",
                ));
            }
        }
        #[cfg(feature = "http-client")]
        ConnectionConfig::HttpWebhook(ref config) => {
            validate_url(&config.url, "http")?;
        }
        #[cfg(feature = "ws-server")]
        ConnectionConfig::Websocket(ref config) => {
            validate_port(config.port)?;
            if config.enable_heartbeat {
                validate_interval("heartbeat_interval", config.heartbeat_interval)?;
            }
        }
        #[cfg(feature = "ws-client")]
        ConnectionConfig::WebsocketReverse(ref config) => {
            validate_url(&config.url, "ws")?;
            validate_interval("reconnect_interval", config.reconnect_interval)?;
            if config.enable_heartbeat {
                validate_interval("heartbeat_interval", config.heartbeat_interval)?;
            }
        }
    }
    Ok(())
}

/// `get_latest_events` reads a single buffer, so only one HTTP connection
/// may keep one.
#[cfg(feature = "http-server")]
fn validate_event_buffers(connections: &[ConnectionConfig]) -> ConfigResult<()> {
    let buffered = connections
        .iter()
        .filter(|connection| {
            matches!(connection, ConnectionConfig::Http(config) if config.event_enabled)
        })
        .count();
    if buffered > 1 {
        return Err(ConfigError::validation(format!(
            "{buffered} HTTP connections have event_enabled; at most one may poll events"
        )));
    }
    Ok(())
}

fn validate_url(url: &str, expected_scheme: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }

    let valid_schemes = match expected_scheme {
        "ws" => ["ws://", "wss://"],
        "http" => ["http://", "https://"],
        _ => return Err(ConfigError::validation("Unknown URL scheme type")),
    };

    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }
    Ok(())
}

fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

fn validate_interval(field: &str, millis: u64) -> ConfigResult<()> {
    if millis == 0 {
        return Err(ConfigError::validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&LibObConfig::default()).is_ok());
    }

    #[test]
    fn duplicate_bots_are_rejected() {
        let bot = BotConfig {
            platform: "qq".to_string(),
            user_id: "1".to_string(),
            online: true,
            extra: Default::default(),
        };
        let config = LibObConfig {
            bots: vec![bot.clone(), bot],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn file_output_needs_a_path() {
        let mut config = LibObConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "logging.file_path"
        ));
    }

    #[cfg(feature = "ws-client")]
    #[test]
    fn reverse_websocket_needs_ws_url_and_interval() {
        use libob_transport::WsReverseConfig;

        let config = LibObConfig {
            connections: vec![ConnectionConfig::WebsocketReverse(WsReverseConfig::new(
                "http://127.0.0.1:6700",
            ))],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut reverse = WsReverseConfig::new("wss://example.com/onebot");
        reverse.reconnect_interval = 0;
        let config = LibObConfig {
            connections: vec![ConnectionConfig::WebsocketReverse(reverse)],
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[cfg(feature = "http-server")]
    #[test]
    fn http_port_and_buffer_are_checked() {
        use libob_transport::HttpConfig;

        let config = LibObConfig {
            connections: vec![ConnectionConfig::Http(HttpConfig {
                port: 0,
                ..Default::default()
            })],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));

        let config = LibObConfig {
            connections: vec![ConnectionConfig::Http(HttpConfig {
                event_buffer_size: 0,
                ..Default::default()
            })],
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[cfg(feature = "http-server")]
    #[test]
    fn only_one_http_connection_polls_events() {
        use libob_transport::HttpConfig;

        let http = |port, event_enabled| {
            ConnectionConfig::Http(HttpConfig {
                port,
                event_enabled,
                ..Default::default()
            })
        };

        let config = LibObConfig {
            connections: vec![http(5700, true), http(5701, false)],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        let config = LibObConfig {
            connections: vec![http(5700, true), http(5701, true)],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }
}
