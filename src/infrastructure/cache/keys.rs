pub struct CacheKey;

impl CacheKey {
    pub fn scheduler_lease(concern: &str) -> String {
        format!("scheduler:{concern}")
    }

    pub fn settings(prefix: &str) -> String {
        format!("settings:{prefix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_keys_are_scoped_per_concern() {
        assert_eq!(CacheKey::scheduler_lease("ai_poll"), "scheduler:ai_poll");
        assert_ne!(
            CacheKey::scheduler_lease("ai_poll"),
            CacheKey::scheduler_lease("printer_retry")
        );
    }
}
