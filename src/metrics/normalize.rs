//! Conversion of internal metric identifiers into wire-safe exposition names.
//!
//! The exposition format only accepts a narrow character set in metric names,
//! so every sample goes through [`normalize`] before it is rendered.

/// Character used both as the segment separator and as the replacement for
/// invalid characters.
const SEPARATOR: char = '_';

/// Unit rescaled to bytes. Decimal megabytes (MB), not binary (MiB).
const MEGABYTES: &str = "MB";

/// Multiplier applied to values reported in [`MEGABYTES`].
const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;

/// Known units and the suffix they map to. Lookup is case-insensitive.
///
/// Only `MB` is rescaled; other SI or binary prefixes are passed through
/// unchanged as literal suffixes.
const KNOWN_UNITS: &[(&str, &str)] = &[
    ("", ""),
    ("count", ""),
    ("B", "bytes"),
    ("MB", "bytes"),
    ("%", "ratio"),
];

/// A single metric sample as produced by a collector.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricIdentifier {
    /// Name of the provider that emitted the metric (e.g. `System.Runtime`).
    pub provider: String,
    /// Metric name, optionally carrying a trailing `{...}` label fragment.
    pub name: String,
    /// Unit reported by the provider, if any.
    pub unit: Option<String>,
    /// Sample value.
    pub value: f64,
}

impl MetricIdentifier {
    /// Creates a new metric identifier.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        unit: Option<&str>,
        value: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            unit: unit.map(str::to_string),
            value,
        }
    }

    /// Normalizes this sample for the exposition endpoint.
    #[must_use]
    pub fn normalize(&self) -> NormalizedMetric {
        normalize(&self.provider, &self.name, self.unit.as_deref(), self.value)
    }
}

/// A metric sample ready to be written as `<wire_name> <wire_value_line>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMetric {
    /// Metric name restricted to the exposition character set.
    pub wire_name: String,
    /// Formatted value, prefixed by the label fragment when one was present.
    pub wire_value_line: String,
}

impl NormalizedMetric {
    /// Renders the sample line.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.wire_name, self.wire_value_line)
    }
}

/// Normalizes a metric identifier into a wire-safe name and value line.
///
/// The name is built as `<provider>_<metric>[_<unit>]`:
/// - provider characters that are not valid are dropped and the result is
///   lowercased; an entirely invalid provider becomes a single `_`
/// - metric characters that are not valid are replaced by `_`, case is kept
/// - the unit is mapped through the known-unit table, unknown units are kept
///
/// A well-formed trailing label fragment (`name{k="v"}`) is moved from the
/// name to the front of the value line. This function never fails.
#[must_use]
pub fn normalize(provider: &str, name: &str, unit: Option<&str>, value: f64) -> NormalizedMetric {
    let suffix = unit.map(unit_suffix);
    let value = if unit.is_some_and(|u| u.eq_ignore_ascii_case(MEGABYTES)) {
        value * BYTES_PER_MEGABYTE
    } else {
        value
    };

    let (metric, labels) = split_labels(name);
    let formatted = format_value(value);
    let wire_value_line = match labels {
        Some(labels) => format!("{labels} {formatted}"),
        None => formatted,
    };

    let suffix = suffix.filter(|s| !s.is_empty());
    let capacity = provider.len() + metric.len() + suffix.map_or(0, |s| s.len() + 1) + 1;
    let mut wire_name = String::with_capacity(capacity);

    if push_provider(&mut wire_name, provider) {
        wire_name.push(SEPARATOR);
    }
    push_segment(&mut wire_name, metric);
    if let Some(suffix) = suffix {
        wire_name.push(SEPARATOR);
        push_segment(&mut wire_name, suffix);
    }

    NormalizedMetric {
        wire_name,
        wire_value_line,
    }
}

/// Maps a unit to its name suffix; unknown units map to themselves.
fn unit_suffix(unit: &str) -> &str {
    KNOWN_UNITS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(unit))
        .map_or(unit, |&(_, suffix)| suffix)
}

/// Splits a trailing `{...}` label fragment off a metric name.
///
/// The fragment is only extracted when it starts at the first `{`, ends at
/// the final character with `}` and has a non-empty interior. Anything else
/// is left in the name.
fn split_labels(name: &str) -> (&str, Option<&str>) {
    let Some(start) = name.find('{') else {
        return (name, None);
    };
    let fragment = &name[start..];
    let well_formed = fragment.len() > 2
        && fragment.ends_with('}')
        && !fragment[1..fragment.len() - 1].contains(['{', '}']);

    if well_formed {
        (&name[..start], Some(fragment))
    } else {
        (name, None)
    }
}

/// Formats a value using culture-invariant decimal text.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}

/// Appends the provider segment; returns `false` when it degenerated to the
/// bare separator, which then also serves as the joining separator.
fn push_provider(out: &mut String, provider: &str) -> bool {
    let start = out.len();
    out.extend(
        provider
            .chars()
            .enumerate()
            .filter(|&(i, c)| is_valid_char(c, i == 0))
            .map(|(_, c)| c.to_ascii_lowercase()),
    );
    if out.len() == start {
        out.push(SEPARATOR);
        return false;
    }
    true
}

fn push_segment(out: &mut String, segment: &str) {
    out.extend(segment.chars().enumerate().map(|(i, c)| {
        if is_valid_char(c, i == 0) {
            c
        } else {
            SEPARATOR
        }
    }));
}

/// Validity predicate shared by every name segment.
///
/// Characters above `z` are never valid, which also rules out all
/// non-ASCII input.
const fn is_valid_char(c: char, is_first: bool) -> bool {
    if c > 'z' {
        return false;
    }
    if c == SEPARATOR {
        return true;
    }
    if is_first {
        c.is_ascii_alphabetic()
    } else {
        c.is_ascii_alphanumeric()
    }
}

