// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parser for bracket range expressions
//!
//! Parses host patterns like `web[01-03].example.com` into segments that the
//! expander turns into concrete hostnames. Zero padding is carried per
//! sub-range: the width of the wider bound literal wins, so `[01-3]`
//! produces `01, 02, 03` while `[1-3]` produces `1, 2, 3`.

use super::error::HostlistError;

/// A single entry inside a bracket expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeItem {
    /// A literal value, kept exactly as written (`05` stays `05`)
    Single(String),
    /// An inclusive numeric range with its zero-pad width
    Range { start: i64, end: i64, width: usize },
}

impl RangeItem {
    /// Number of values this item expands to
    pub fn count(&self) -> usize {
        match self {
            RangeItem::Single(_) => 1,
            RangeItem::Range { start, end, .. } => (end - start + 1) as usize,
        }
    }

    /// Append the formatted values of this item to `out`
    pub fn emit(&self, out: &mut Vec<String>) {
        match self {
            RangeItem::Single(value) => out.push(value.clone()),
            RangeItem::Range { start, end, width } => {
                for value in *start..=*end {
                    out.push(format!("{value:0>width$}", width = *width));
                }
            }
        }
    }
}

/// A parsed bracket expression: the comma-separated items between `[` and `]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketExpression {
    pub items: Vec<RangeItem>,
}

impl BracketExpression {
    /// Total number of values across all items
    pub fn value_count(&self) -> usize {
        self.items.iter().map(RangeItem::count).sum()
    }

    /// All values in written order
    pub fn values(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.value_count());
        for item in &self.items {
            item.emit(&mut out);
        }
        out
    }
}

/// One segment of a host pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Literal text (e.g., "web", ".example.com")
    Literal(String),
    /// A bracket expression (e.g., `[01-03]`)
    Bracket(BracketExpression),
}

/// A complete parsed host pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    pub segments: Vec<PatternSegment>,
}

impl HostPattern {
    pub fn has_brackets(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PatternSegment::Bracket(_)))
    }

    /// Expected expansion count (product of all bracket sizes)
    pub fn expansion_count(&self) -> usize {
        let mut count = 1usize;
        for segment in &self.segments {
            if let PatternSegment::Bracket(expr) = segment {
                count = count.saturating_mul(expr.value_count());
            }
        }
        count
    }
}

/// Parse a host pattern string into literal and bracket segments
pub fn parse_host_pattern(pattern: &str) -> Result<HostPattern, HostlistError> {
    let mut segments = Vec::new();
    let mut current_literal = String::new();
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '[' => {
                if !current_literal.is_empty() {
                    segments.push(PatternSegment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut body = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        '[' => {
                            return Err(HostlistError::NestedBrackets {
                                expression: pattern.to_string(),
                            });
                        }
                        ']' => {
                            closed = true;
                            break;
                        }
                        _ => body.push(inner),
                    }
                }

                if !closed {
                    return Err(HostlistError::UnclosedBracket {
                        expression: pattern.to_string(),
                    });
                }
                if body.is_empty() {
                    return Err(HostlistError::EmptyBracket {
                        expression: pattern.to_string(),
                    });
                }

                segments.push(PatternSegment::Bracket(parse_bracket_body(&body, pattern)?));
            }
            ']' => {
                return Err(HostlistError::UnmatchedBracket {
                    expression: pattern.to_string(),
                });
            }
            _ => current_literal.push(ch),
        }
    }

    if !current_literal.is_empty() {
        segments.push(PatternSegment::Literal(current_literal));
    }

    Ok(HostPattern { segments })
}

/// Parse the content between brackets into range items
fn parse_bracket_body(body: &str, pattern: &str) -> Result<BracketExpression, HostlistError> {
    let mut items = Vec::new();

    for item_str in body.split(',') {
        let item_str = item_str.trim();
        if item_str.is_empty() {
            continue;
        }

        if let Some((start_str, end_str)) = item_str.split_once('-') {
            let start = parse_bound(start_str, pattern)?;
            let end = parse_bound(end_str, pattern)?;

            // Pad width follows the wider bound literal; a lower bound wider
            // than the upper bound has no defined padding and is rejected.
            if start_str.len() > end_str.len() {
                return Err(HostlistError::PaddedBoundOrder {
                    expression: pattern.to_string(),
                    start: start_str.to_string(),
                    end: end_str.to_string(),
                });
            }
            if start > end {
                return Err(HostlistError::ReversedRange {
                    expression: pattern.to_string(),
                    start,
                    end,
                });
            }

            items.push(RangeItem::Range {
                start,
                end,
                width: start_str.len().max(end_str.len()),
            });
        } else {
            parse_bound(item_str, pattern)?;
            items.push(RangeItem::Single(item_str.to_string()));
        }
    }

    if items.is_empty() {
        return Err(HostlistError::EmptyBracket {
            expression: pattern.to_string(),
        });
    }

    Ok(BracketExpression { items })
}

fn parse_bound(s: &str, pattern: &str) -> Result<i64, HostlistError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(HostlistError::InvalidNumber {
            expression: pattern.to_string(),
            value: s.to_string(),
        });
    }
    s.parse().map_err(|_| HostlistError::InvalidNumber {
        expression: pattern.to_string(),
        value: s.to_string(),
    })
}
