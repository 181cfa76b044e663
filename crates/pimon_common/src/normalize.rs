//! Normalizer for qmicli output.
//!
//! qmicli prints tab-indented, mostly YAML-shaped text decorated with device
//! prefixes, success banners, index markers and unit words. The rules below
//! strip that decoration so the remainder parses as nested `key: value` data.
//!
//! Example:
//! ```text
//! [/dev/cdc-wdm0] Successfully got serving system:
//! 	Radio interfaces: '1'
//! 		[0]: 'lte'
//! 	3GPP time zone offset: '120' minutes
//! ```
//! becomes
//! ```text
//! Successfully got serving system:
//!     Radio interfaces:
//!         - 'lte'
//!     3GPP time zone offset: '120'
//! ```

/// Device used when no other one is configured.
pub const DEFAULT_DEVICE: &str = "/dev/cdc-wdm0";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Replace(String, String),
    /// `4k+1` leading spaces become `4k`
    CollapseIndent,
}

impl Rule {
    fn strip(pattern: &str) -> Self {
        Self::Replace(pattern.to_string(), String::new())
    }

    fn replace(from: &str, to: &str) -> Self {
        Self::Replace(from.to_string(), to.to_string())
    }

    fn apply(&self, text: &str) -> String {
        match self {
            Self::Replace(from, to) => text.replace(from.as_str(), to),
            Self::CollapseIndent => collapse_indent(text),
        }
    }
}

/// Ordered substitution table for one modem device.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<Rule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::for_device(DEFAULT_DEVICE)
    }
}

impl Normalizer {
    /// Build the table; the device path only affects the prefix rule.
    pub fn for_device(device: &str) -> Self {
        let rules = vec![
            Rule::replace("\t", "    "),
            Rule::replace("[0]:", "-"),
            Rule::strip(&format!("[{}] ", device)),
            Rule::strip("[Invalid UTF-8]"),
            Rule::CollapseIndent,
            Rule::strip("minutes"),
            Rule::strip("hours"),
            Rule::strip("'1'"),
            Rule::replace("'off' (lte)", "'off'"),
            Rule::replace("'on' (lte)", "'on'"),
            Rule::strip("Successfully got signal strength"),
            Rule::strip("Successfully got signal info"),
            Rule::replace("Network 'lte'", "Network"),
        ];
        Self { rules }
    }

    /// Apply the table until the text stops changing.
    ///
    /// After the first pass no tabs remain and every rule only removes
    /// characters, so the loop terminates. Running to a fixed point makes
    /// `normalize(normalize(x)) == normalize(x)` hold even when a strip
    /// exposes a pattern an earlier rule would have matched.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = self.apply_once(raw);
        loop {
            let next = self.apply_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn apply_once(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }
}

/// Normalize with the default device table.
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

fn collapse_indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if indent % 4 == 1 {
            out.push_str(&line[1..]);
        } else {
            out.push_str(line);
        }
    }
    out
}
