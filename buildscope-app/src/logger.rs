use std::env;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Without `RUST_LOG`, every module in
/// `modules` logs at `log_level`.
pub fn setup(modules: &[&str], log_level: &str) {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", default_filter(modules, log_level));
    }
    let subscriber = get_subscriber();
    subscriber.init();
}

fn default_filter(modules: &[&str], log_level: &str) -> String {
    modules
        .iter()
        .map(|module| format!("{module}={log_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn get_subscriber() -> SubscriberBuilder<DefaultFields, Format, EnvFilter> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_lists_every_module() {
        assert_eq!(
            default_filter(&["buildscope_app", "buildscope_core"], "info"),
            "buildscope_app=info,buildscope_core=info"
        );
    }
}
