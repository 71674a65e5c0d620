use super::Config;

pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply `TOM_*` overrides read through `lookup`. Invalid values are logged
/// and ignored.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let value = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(addr) = value("TOM_LISTEN_ADDR") {
        config.node.listen_addr = Some(addr);
    }

    if let Some(raw) = value("TOM_PEERS") {
        config.node.peers = raw
            .split(',')
            .map(str::trim)
            .filter(|peer| !peer.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(raw) = value("TOM_MAX_ATTEMPTS") {
        match raw.parse::<u32>() {
            Ok(value) if value > 0 => config.retry.max_attempts = value,
            Ok(_) => tracing::warn!("invalid TOM_MAX_ATTEMPTS, ignoring: must be at least 1"),
            Err(err) => tracing::warn!("invalid TOM_MAX_ATTEMPTS, ignoring: {err}"),
        }
    }

    if let Some(raw) = value("TOM_RATE") {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => config.engine.rate = value,
            Ok(value) => tracing::warn!("invalid TOM_RATE, ignoring: {value} is not positive"),
            Err(err) => tracing::warn!("invalid TOM_RATE, ignoring: {err}"),
        }
    }

    if let Some(raw) = value("TOM_SEED") {
        match raw.parse::<u64>() {
            Ok(value) => config.engine.seed = Some(value),
            Err(err) => tracing::warn!("invalid TOM_SEED, ignoring: {err}"),
        }
    }
}
