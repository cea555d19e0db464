//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const SERVICE_INFO: &str = "/service-info";
pub const PEERS: &str = "/peers";
pub const SEARCH_AGGREGATE: &str = "/search-aggregate/{*search_path}";

pub mod private {
    pub const REFRESH_PEERS: &str = "/private/peers/refresh";
    pub const POST_START_HOOK: &str = "/private/post-start-hook";
}

pub fn drop_leading_slash(path: &str) -> &str {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped
    } else {
        path
    }
}

pub fn search_aggregate_path(search_path: &str) -> String {
    SEARCH_AGGREGATE.replace("{*search_path}", drop_leading_slash(search_path))
}
