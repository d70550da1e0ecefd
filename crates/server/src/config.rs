use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub max_students_per_room: usize,
    /// Capacity of each connection's outbound queue and each room's
    /// broadcast channel.
    pub channel_capacity: usize,
    /// Interpreter used by the code runner; the source is passed as its last
    /// argument.
    pub run_program: String,
    pub run_args: Vec<String>,
    pub run_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            max_students_per_room: env::var("MAX_STUDENTS_PER_ROOM")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_students_per_room),
            channel_capacity: env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.channel_capacity),
            run_program: env::var("RUN_PROGRAM").unwrap_or(defaults.run_program),
            run_args: env::var("RUN_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.run_args),
            run_timeout_secs: env::var("RUN_TIMEOUT_SECS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.run_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            max_students_per_room: 30,
            channel_capacity: 256,
            run_program: "python3".to_string(),
            run_args: vec!["-c".to_string()],
            run_timeout_secs: 5,
        }
    }
}
