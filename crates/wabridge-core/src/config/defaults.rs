//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "wabridge".to_string()
}

pub fn default_data_dir() -> String {
    "~/.wabridge".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}

pub fn default_sidecar_url() -> String {
    "ws://127.0.0.1:9876".to_string()
}

pub fn default_client_id() -> String {
    "default".to_string()
}

pub fn default_session_dir() -> String {
    "~/.wabridge/.wwebjs_auth".to_string()
}

pub fn default_cache_dir() -> String {
    "~/.wabridge/.wwebjs_cache".to_string()
}

pub fn default_reconnect_delay_secs() -> u64 {
    15
}

pub fn default_request_timeout_secs() -> u64 {
    60
}

pub fn default_init_timeout_secs() -> u64 {
    180
}
