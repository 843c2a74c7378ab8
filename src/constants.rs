pub mod operator {

    pub const USERNAME_MIN_LEN: usize = 3;

    pub const USERNAME_MAX_LEN: usize = 50;

    pub const EMAIL_MAX_LEN: usize = 100;

    pub const PASSWORD_MIN_LEN: usize = 8;

    /// Longest plaintext accepted, in bytes.
    pub const PASSWORD_MAX_LEN: usize = 72;
}

pub mod token {

    pub const LIFETIME_HOURS: i64 = 24;

    pub const MIN_SECRET_BYTES: usize = 32;
}

pub mod rate_limit {
    use std::time::Duration;

    pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 100;

    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

    pub const SHARD_COUNT: usize = 16;
}
