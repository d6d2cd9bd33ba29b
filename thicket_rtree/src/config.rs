// Copyright 2026 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree configuration with warn-and-clamp validation.

/// Default maximum entries per node.
pub const DEFAULT_MAX_NODE_ENTRIES: usize = 50;
/// Default minimum entries per node.
pub const DEFAULT_MIN_NODE_ENTRIES: usize = 20;

/// Node fan-out configuration for [`crate::RTree`].
///
/// Invalid values are never fatal: they are replaced with usable ones and a
/// warning is logged. `max_node_entries` must be at least 2 (a node with
/// fewer entries cannot be split); `min_node_entries` must lie in
/// `1..=max_node_entries / 2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries per node.
    pub max_node_entries: usize,
    /// Minimum number of entries per non-root node.
    pub min_node_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_node_entries: DEFAULT_MAX_NODE_ENTRIES,
            min_node_entries: DEFAULT_MIN_NODE_ENTRIES,
        }
    }
}

impl Config {
    /// Create a configuration, clamping invalid values with a warning.
    pub fn new(max_node_entries: usize, min_node_entries: usize) -> Self {
        let mut max = max_node_entries;
        let mut min = min_node_entries;

        if max < 2 {
            log::warn!(
                "invalid MaxNodeEntries = {max}, resetting to default of {DEFAULT_MAX_NODE_ENTRIES}"
            );
            max = DEFAULT_MAX_NODE_ENTRIES;
        }
        if min < 1 || min > max / 2 {
            log::warn!("MinNodeEntries must be between 1 and MaxNodeEntries / 2, using {}", max / 2);
            min = max / 2;
        }

        Self {
            max_node_entries: max,
            min_node_entries: min,
        }
    }

    /// Build a configuration from string key/value options.
    ///
    /// Recognized keys are `MaxNodeEntries` and `MinNodeEntries`; all other
    /// keys are ignored. Unparsable values are replaced with defaults, with
    /// a warning.
    pub fn from_options<'a, I>(options: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut max = 0usize;
        let mut min = 0usize;
        for (key, value) in options {
            match key {
                "MaxNodeEntries" => max = parse_entry_count(key, value),
                "MinNodeEntries" => min = parse_entry_count(key, value),
                _ => {}
            }
        }
        Self::new(max, min)
    }
}

fn parse_entry_count(key: &str, value: &str) -> usize {
    match value.parse::<usize>() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("non-numeric {key} = {value:?}, using default");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let c = Config::default();
        assert_eq!(c.max_node_entries, 50);
        assert_eq!(c.min_node_entries, 20);
    }

    #[test]
    fn clamps_out_of_range() {
        let c = Config::new(1, 10);
        assert_eq!(c.max_node_entries, DEFAULT_MAX_NODE_ENTRIES);
        assert_eq!(c.min_node_entries, DEFAULT_MAX_NODE_ENTRIES / 2);

        let c = Config::new(8, 7);
        assert_eq!(c.max_node_entries, 8);
        assert_eq!(c.min_node_entries, 4);

        let c = Config::new(8, 0);
        assert_eq!(c.min_node_entries, 4);
    }

    #[test]
    fn accepts_valid_values() {
        let c = Config::new(10, 5);
        assert_eq!(c.max_node_entries, 10);
        assert_eq!(c.min_node_entries, 5);
    }

    #[test]
    fn from_options_ignores_unknown_keys() {
        let c = Config::from_options([
            ("MaxNodeEntries", "12"),
            ("MinNodeEntries", "3"),
            ("SomethingElse", "true"),
        ]);
        assert_eq!(c.max_node_entries, 12);
        assert_eq!(c.min_node_entries, 3);
    }

    #[test]
    fn from_options_substitutes_defaults_for_garbage() {
        let c = Config::from_options([("MaxNodeEntries", "lots"), ("MinNodeEntries", "-4")]);
        assert_eq!(c.max_node_entries, DEFAULT_MAX_NODE_ENTRIES);
        assert_eq!(c.min_node_entries, DEFAULT_MAX_NODE_ENTRIES / 2);
    }
}
