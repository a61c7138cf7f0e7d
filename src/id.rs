//! ID generation utilities
//!
//! Identifiers for plans, levels, tasks and events.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a prefixed unique identifier
///
/// Format: `{prefix}-{timestamp_ms}-{random_hex}`
/// Example: `plan-1738300800123-a1b2c3d4`
pub fn generate_id(prefix: &str) -> String {
    let random: u32 = rand::rng().random();
    format!("{}-{}-{:08x}", prefix, now_ms(), random)
}

/// Generate a plan ID
pub fn generate_plan_id() -> String {
    generate_id("plan")
}

/// Generate a level ID
pub fn generate_level_id() -> String {
    generate_id("level")
}

/// Generate a task ID
pub fn generate_task_id() -> String {
    generate_id("task")
}

/// Generate an event ID
pub fn generate_event_id() -> String {
    generate_id("evt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("plan");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "plan");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let ids: std::collections::HashSet<String> = (0..100).map(|_| generate_task_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_typed_prefixes() {
        assert!(generate_plan_id().starts_with("plan-"));
        assert!(generate_level_id().starts_with("level-"));
        assert!(generate_task_id().starts_with("task-"));
        assert!(generate_event_id().starts_with("evt-"));
    }
}
