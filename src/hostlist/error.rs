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

//! Error types for hostlist parsing and expansion

use thiserror::Error;

/// Errors that can occur during hostlist parsing and expansion
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostlistError {
    /// Empty bracket expression (e.g., `node[]`)
    #[error("empty bracket expression in '{expression}'")]
    EmptyBracket { expression: String },

    /// Unclosed bracket (e.g., `node[1-5`)
    #[error("unclosed bracket in '{expression}'")]
    UnclosedBracket { expression: String },

    /// Unmatched closing bracket (e.g., `node]1-5[`)
    #[error("unmatched closing bracket in '{expression}'")]
    UnmatchedBracket { expression: String },

    /// Nested brackets (e.g., `node[[1-2]]`)
    #[error("nested brackets are not supported in '{expression}'")]
    NestedBrackets { expression: String },

    /// Reversed range (e.g., `node[5-1]`)
    #[error("reversed range '{start}-{end}' in '{expression}' (start must be <= end)")]
    ReversedRange {
        expression: String,
        start: i64,
        end: i64,
    },

    /// A zero-padded lower bound wider than the upper bound (e.g., `node[010-9]`)
    #[error("lower bound '{start}' is wider than upper bound '{end}' in '{expression}'")]
    PaddedBoundOrder {
        expression: String,
        start: String,
        end: String,
    },

    /// Invalid number in range
    #[error("invalid number '{value}' in range expression '{expression}'")]
    InvalidNumber { expression: String, value: String },

    /// Range produces too many hosts
    #[error(
        "range expansion would produce {count} hosts, exceeding limit of {limit} in '{expression}'"
    )]
    RangeTooLarge {
        expression: String,
        count: usize,
        limit: usize,
    },

    /// Expansion recursed past the depth limit (cyclic resolver output)
    #[error("expansion did not settle after {limit} resolver passes")]
    RecursionLimit { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HostlistError::EmptyBracket {
            expression: "node[]".to_string(),
        };
        assert_eq!(err.to_string(), "empty bracket expression in 'node[]'");

        let err = HostlistError::UnclosedBracket {
            expression: "node[1-5".to_string(),
        };
        assert_eq!(err.to_string(), "unclosed bracket in 'node[1-5'");

        let err = HostlistError::PaddedBoundOrder {
            expression: "node[010-9]".to_string(),
            start: "010".to_string(),
            end: "9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "lower bound '010' is wider than upper bound '9' in 'node[010-9]'"
        );
    }
}
