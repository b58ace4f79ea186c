//! 分析服务的接口地址

pub const ANALYZE_MULTIPLE: &str = "/api/dify/analyze-multiple";
pub const ANALYZE_SEQUENTIAL: &str = "/api/dify/analyze-sequential";
pub const ANALYZE_ITERATOR: &str = "/api/dify/analyze-iterator";
pub const SAVE_RESULTS: &str = "/api/save-results";

fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn analyze_multiple_url(base_url: &str) -> String {
    join(base_url, ANALYZE_MULTIPLE)
}

pub fn analyze_sequential_url(base_url: &str) -> String {
    join(base_url, ANALYZE_SEQUENTIAL)
}

pub fn analyze_iterator_url(base_url: &str) -> String {
    join(base_url, ANALYZE_ITERATOR)
}

pub fn session_status_url(base_url: &str, session_id: &str) -> String {
    join(base_url, &format!("/api/dify/session/{}/status", session_id))
}

pub fn session_cleanup_url(base_url: &str, session_id: &str) -> String {
    join(base_url, &format!("/api/dify/session/{}/cleanup", session_id))
}

pub fn session_retry_url(base_url: &str, session_id: &str) -> String {
    join(base_url, &format!("/api/dify/session/{}/retry-failed", session_id))
}

pub fn session_stream_url(base_url: &str, session_id: &str) -> String {
    join(base_url, &format!("/api/dify/session/{}/stream", session_id))
}

pub fn save_results_url(base_url: &str) -> String {
    join(base_url, SAVE_RESULTS)
}
