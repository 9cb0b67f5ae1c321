// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! VM configuration.

use std::env;

use tracing::warn;

/// Limits and switches for one VM instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum call depth.
    pub frames_max: usize,
    /// Maximum number of value-stack slots.
    pub stack_max: usize,
    /// Emit a `trace!` event for every instruction executed.
    pub trace_execution: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            frames_max: 64,
            stack_max: 64 * 256,
            trace_execution: false,
        }
    }
}

impl VmConfig {
    /// Defaults overridden by `KESTREL_FRAMES_MAX`, `KESTREL_STACK_MAX` and
    /// `KESTREL_TRACE`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(frames) = parse_limit(&lookup, "KESTREL_FRAMES_MAX") {
            config.frames_max = frames;
        }
        if let Some(slots) = parse_limit(&lookup, "KESTREL_STACK_MAX") {
            config.stack_max = slots;
        }
        if let Some(flag) = lookup("KESTREL_TRACE") {
            config.trace_execution = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        config
    }

    pub fn with_frames_max(mut self, frames_max: usize) -> Self {
        self.frames_max = frames_max;
        self
    }

    pub fn with_stack_max(mut self, stack_max: usize) -> Self {
        self.stack_max = stack_max;
        self
    }

    pub fn with_trace_execution(mut self, on: bool) -> Self {
        self.trace_execution = on;
        self
    }
}

fn parse_limit(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(key, value = %raw, "ignoring invalid limit");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = VmConfig::default();
        assert_eq!(config.frames_max, 64);
        assert_eq!(config.stack_max, 64 * 256);
        assert!(!config.trace_execution);
    }

    #[test]
    fn environment_overrides() {
        let pairs = [
            ("KESTREL_FRAMES_MAX", "128"),
            ("KESTREL_STACK_MAX", " 4096 "),
            ("KESTREL_TRACE", "1"),
        ];
        let config = VmConfig::from_lookup(lookup(&pairs));
        assert_eq!(config.frames_max, 128);
        assert_eq!(config.stack_max, 4096);
        assert!(config.trace_execution);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let pairs = [("KESTREL_FRAMES_MAX", "lots"), ("KESTREL_STACK_MAX", "0")];
        assert_eq!(VmConfig::from_lookup(lookup(&pairs)), VmConfig::default());
    }
}
