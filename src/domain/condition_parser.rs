//! Condition DSL parser.
//!
//! Recursive descent over the text form produced by `Display for Condition`:
//!
//! ```text
//! condition := name '(' args ')'
//! arg       := column | number | condition
//! list      := condition (';' condition)*
//! ```
//!
//! Primitive names are lowercase. Column names are `[A-Za-z0-9_]+` and may not
//! start with a digit. Errors carry the byte offset of the offending token.

use crate::domain::condition::{Condition, Ref};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected integer".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    fn parse_column(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        let valid = word
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && word.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(ParseError {
                message: format!("expected column name, found '{}'", word),
                position: self.pos,
            });
        }
        self.pos += word.len();
        Ok(word)
    }

    fn parse_ref(&mut self) -> Result<Ref, ParseError> {
        self.skip_whitespace();
        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Ref::Value(self.parse_number()?));
        }
        Ok(Ref::Column(self.parse_column()?))
    }

    fn comma(&mut self) -> Result<(), ParseError> {
        self.expect_char(',')
    }

    fn parse_list_body(&mut self, name: &str) -> Result<Vec<Condition>, ParseError> {
        let mut children = vec![self.parse_condition()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')
                .map_err(|err| ParseError {
                    message: format!("{} in {}(...)", err.message, name),
                    position: err.position,
                })?;
            children.push(self.parse_condition()?);
        }
        Ok(children)
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let name = self.peek_word();
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ParseError {
                message: format!("expected condition, found '{}'", name),
                position: start,
            });
        }
        self.pos += name.len();
        self.expect_char('(')?;

        if name == "all_of" || name == "any_of" {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                return Err(ParseError {
                    message: format!("{} requires at least 1 condition", name),
                    position: self.pos,
                });
            }
            let children = self.parse_list_body(&name)?;
            return Ok(if name == "all_of" {
                Condition::AllOf(children)
            } else {
                Condition::AnyOf(children)
            });
        }

        let condition = match name.as_str() {
            "above" | "below" | "crosses_above" | "crosses_below" => {
                let column = self.parse_column()?;
                self.comma()?;
                let reference = self.parse_ref()?;
                match name.as_str() {
                    "above" => Condition::Above { column, reference },
                    "below" => Condition::Below { column, reference },
                    "crosses_above" => Condition::CrossesAbove { column, reference },
                    _ => Condition::CrossesBelow { column, reference },
                }
            }
            "between" => {
                let column = self.parse_column()?;
                self.comma()?;
                let low = self.parse_number()?;
                self.comma()?;
                let high = self.parse_number()?;
                Condition::Between { column, low, high }
            }
            "rising" | "falling" => {
                let column = self.parse_column()?;
                self.comma()?;
                let bars = self.parse_integer()?;
                if name == "rising" {
                    Condition::Rising { column, bars }
                } else {
                    Condition::Falling { column, bars }
                }
            }
            "pullback_to" | "pullback_below" => {
                let level = self.parse_column()?;
                self.comma()?;
                let tolerance_atr_mult = self.parse_number()?;
                if name == "pullback_to" {
                    Condition::PullbackTo {
                        level,
                        tolerance_atr_mult,
                    }
                } else {
                    Condition::PullbackBelow {
                        level,
                        tolerance_atr_mult,
                    }
                }
            }
            "bullish_divergence" | "bearish_divergence" => {
                let indicator = self.parse_column()?;
                self.comma()?;
                let lookback = self.parse_integer()?;
                if name == "bullish_divergence" {
                    Condition::BullishDivergence {
                        indicator,
                        lookback,
                    }
                } else {
                    Condition::BearishDivergence {
                        indicator,
                        lookback,
                    }
                }
            }
            "candle_bullish" => Condition::CandleBullish {
                pattern: self.parse_column()?,
            },
            "candle_bearish" => Condition::CandleBearish {
                pattern: self.parse_column()?,
            },
            "consecutive_higher_closes" => Condition::ConsecutiveHigherCloses {
                count: self.parse_integer()?,
            },
            "consecutive_lower_closes" => Condition::ConsecutiveLowerCloses {
                count: self.parse_integer()?,
            },
            "squeeze" => {
                let width = self.parse_column()?;
                self.comma()?;
                let lookback = self.parse_integer()?;
                Condition::Squeeze { width, lookback }
            }
            "range_exceeds_atr" => Condition::RangeExceedsAtr {
                multiplier: self.parse_number()?,
            },
            "narrowest_range" => Condition::NarrowestRange {
                lookback: self.parse_integer()?,
            },
            "breaks_above_level" => Condition::BreaksAboveLevel {
                level: self.parse_column()?,
            },
            "breaks_below_level" => Condition::BreaksBelowLevel {
                level: self.parse_column()?,
            },
            "in_top_pct_of_range" => Condition::InTopPctOfRange {
                pct: self.parse_number()?,
            },
            "in_bottom_pct_of_range" => Condition::InBottomPctOfRange {
                pct: self.parse_number()?,
            },
            "gap_up" => Condition::GapUp {
                atr_mult: self.parse_number()?,
            },
            "gap_down" => Condition::GapDown {
                atr_mult: self.parse_number()?,
            },
            "deviation_below" | "deviation_above" => {
                let column = self.parse_column()?;
                self.comma()?;
                let reference = self.parse_column()?;
                self.comma()?;
                let atr_mult = self.parse_number()?;
                if name == "deviation_below" {
                    Condition::DeviationBelow {
                        column,
                        reference,
                        atr_mult,
                    }
                } else {
                    Condition::DeviationAbove {
                        column,
                        reference,
                        atr_mult,
                    }
                }
            }
            "was_below_then_crosses_above" | "was_above_then_crosses_below" => {
                let column = self.parse_column()?;
                self.comma()?;
                let threshold = self.parse_number()?;
                self.comma()?;
                let lookback = self.parse_integer()?;
                if name == "was_below_then_crosses_above" {
                    Condition::WasBelowThenCrossesAbove {
                        column,
                        threshold,
                        lookback,
                    }
                } else {
                    Condition::WasAboveThenCrossesBelow {
                        column,
                        threshold,
                        lookback,
                    }
                }
            }
            "held_above" | "held_below" => {
                let column = self.parse_column()?;
                self.comma()?;
                let threshold = self.parse_number()?;
                self.comma()?;
                let bars = self.parse_integer()?;
                if name == "held_above" {
                    Condition::HeldAbove {
                        column,
                        threshold,
                        bars,
                    }
                } else {
                    Condition::HeldBelow {
                        column,
                        threshold,
                        bars,
                    }
                }
            }
            _ => {
                return Err(ParseError {
                    message: format!("unknown condition '{}'", name),
                    position: start,
                });
            }
        };
        self.expect_char(')')?;
        Ok(condition)
    }

    fn parse(&mut self) -> Result<Condition, ParseError> {
        let condition = self.parse_condition()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after condition: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(condition)
    }

    fn parse_list(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut conditions = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }
            if self.peek() == Some(';') {
                // tolerate empty items such as a trailing separator
                self.advance();
                continue;
            }
            conditions.push(self.parse_condition()?);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(';') => {
                    self.advance();
                }
                Some(ch) => {
                    return Err(ParseError {
                        message: format!("expected ';' between conditions, found '{}'", ch),
                        position: self.pos,
                    });
                }
            }
        }
        Ok(conditions)
    }
}

/// Parse a single condition.
pub fn parse(input: &str) -> Result<Condition, ParseError> {
    Parser::new(input).parse()
}

/// Parse a `;`-separated list of conditions. Blank input yields an empty list.
pub fn parse_list(input: &str) -> Result<Vec<Condition>, ParseError> {
    Parser::new(input).parse_list()
}
