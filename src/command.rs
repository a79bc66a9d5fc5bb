//! Command grammar.
//!
//! A received line is matched, in order, against the query set, the exact
//! action set, the prefix action set, and finally falls back to
//! [`Command::Ignored`]. Matching is case-insensitive; numeric arguments are
//! taken from the line as received.

use crate::error::CommandError;
use crate::instrument::{MeasurementMode, SourceMode};

/// Range prefixes, checked before the `:SOUR:VOLT` / `:SOUR:CURR` setpoints
/// they would otherwise collide with.
const RANGE_PREFIXES: [&str; 4] = [":SOUR:VOLT:RANG", ":SOUR:CURR:RANG", ":VOLT:RANG", ":CURR:RANG"];

/// Protection prefixes; a leading colon is optional.
const PROTECTION_PREFIXES: [&str; 2] = ["SENS:VOLT:PROT", "CURR:PROT"];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `*IDN?`
    Identify,
    /// `:CONF?`
    QueryConfiguration,
    /// `:READ?`
    Read,
    /// Any other line ending in `?`.
    UnknownQuery,
    /// Recognised but without effect (data format, range, protection).
    Accepted(&'static str),
    /// `:OUTP 1` / `:OUTP 0`
    SetOutput(bool),
    /// `:CONF:VOLT` / `:CONF:CURR` / `:CONF:RES`
    Configure(MeasurementMode),
    /// `:SOUR:FUNC VOLT` / `:SOUR:FUNC CURR`
    SourceFunction(SourceMode),
    /// `:SOUR:VOLT <volts>`
    SourceVoltage(f64),
    /// `:SOUR:CURR <amps>`
    SourceCurrent(f64),
    /// Unrecognised action.
    Ignored,
}

impl Command {
    /// Whether the command expects a reply.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::Identify | Command::QueryConfiguration | Command::Read | Command::UnknownQuery
        )
    }

    /// Parses one framed line.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let raw = line.trim();
        let normalized = raw.to_ascii_uppercase();

        if normalized.ends_with('?') {
            return Ok(match normalized.as_str() {
                "*IDN?" => Command::Identify,
                ":CONF?" => Command::QueryConfiguration,
                ":READ?" => Command::Read,
                _ => Command::UnknownQuery,
            });
        }

        let exact = match normalized.as_str() {
            ":FORM:DATA ASC" => Some(Command::Accepted("data format")),
            ":OUTP 1" | ":OUTP ON" => Some(Command::SetOutput(true)),
            ":OUTP 0" | ":OUTP OFF" => Some(Command::SetOutput(false)),
            ":CONF:VOLT" => Some(Command::Configure(MeasurementMode::Voltage)),
            ":CONF:CURR" => Some(Command::Configure(MeasurementMode::Current)),
            ":CONF:RES" => Some(Command::Configure(MeasurementMode::Resistance)),
            ":SOUR:FUNC VOLT" => Some(Command::SourceFunction(SourceMode::Voltage)),
            ":SOUR:FUNC CURR" => Some(Command::SourceFunction(SourceMode::Current)),
            _ => None,
        };
        if let Some(command) = exact {
            return Ok(command);
        }

        if RANGE_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
            return Ok(Command::Accepted("range"));
        }
        let unrooted = normalized.strip_prefix(':').unwrap_or(normalized.as_str());
        if PROTECTION_PREFIXES.iter().any(|p| unrooted.starts_with(p)) {
            return Ok(Command::Accepted("protection"));
        }

        if normalized.starts_with(":SOUR:VOLT") {
            return numeric_argument(raw).map(Command::SourceVoltage);
        }
        if normalized.starts_with(":SOUR:CURR") {
            return numeric_argument(raw).map(Command::SourceCurrent);
        }

        Ok(Command::Ignored)
    }
}

/// Extracts the number following the first space of `raw`.
fn numeric_argument(raw: &str) -> Result<f64, CommandError> {
    match raw.split_once(' ') {
        Some((_, rest)) if !rest.trim().is_empty() => Ok(parse_leading_float(rest)),
        _ => Err(CommandError::MissingArgument(raw.to_string())),
    }
}

/// Parses the longest numeric prefix of `text`, or returns `0.0` when there
/// is none. `"1.5V"` reads as `1.5` and `"abc"` as `0.0`.
pub fn parse_leading_float(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    text[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_match_exactly_ignoring_case() {
        assert_eq!(Command::parse("*IDN?"), Ok(Command::Identify));
        assert_eq!(Command::parse("*idn?"), Ok(Command::Identify));
        assert_eq!(Command::parse(":conf?"), Ok(Command::QueryConfiguration));
        assert_eq!(Command::parse(":READ?"), Ok(Command::Read));
        assert_eq!(Command::parse(":READ:ALL?"), Ok(Command::UnknownQuery));
        assert_eq!(Command::parse(":BOGUS?"), Ok(Command::UnknownQuery));
    }

    #[test]
    fn configure_and_source_function() {
        assert_eq!(
            Command::parse(":conf:curr"),
            Ok(Command::Configure(MeasurementMode::Current))
        );
        assert_eq!(
            Command::parse(":CONF:RES"),
            Ok(Command::Configure(MeasurementMode::Resistance))
        );
        assert_eq!(
            Command::parse(":SOUR:FUNC CURR"),
            Ok(Command::SourceFunction(SourceMode::Current))
        );
        assert_eq!(Command::parse(":CONF:VOLT:DC"), Ok(Command::Ignored));
    }

    #[test]
    fn output_switch() {
        assert_eq!(Command::parse(":OUTP 1"), Ok(Command::SetOutput(true)));
        assert_eq!(Command::parse(":outp off"), Ok(Command::SetOutput(false)));
        assert_eq!(Command::parse(":OUTP 2"), Ok(Command::Ignored));
    }

    #[test]
    fn range_and_protection_are_accepted() {
        assert_eq!(Command::parse(":SOUR:VOLT:RANG 2"), Ok(Command::Accepted("range")));
        assert_eq!(Command::parse(":curr:rang:auto on"), Ok(Command::Accepted("range")));
        assert_eq!(Command::parse(":SENS:VOLT:PROT 3"), Ok(Command::Accepted("protection")));
        assert_eq!(Command::parse("CURR:PROT 0.01"), Ok(Command::Accepted("protection")));
        assert_eq!(Command::parse(":FORM:DATA ASC"), Ok(Command::Accepted("data format")));
    }

    #[test]
    fn setpoints_keep_argument_text() {
        assert_eq!(Command::parse(":SOUR:VOLT 1.5"), Ok(Command::SourceVoltage(1.5)));
        assert_eq!(Command::parse(":sour:curr 1E-3"), Ok(Command::SourceCurrent(0.001)));
        assert_eq!(Command::parse(":SOUR:VOLT:LEV 2.25"), Ok(Command::SourceVoltage(2.25)));
        assert_eq!(Command::parse(":SOUR:VOLT   0.5  "), Ok(Command::SourceVoltage(0.5)));
    }

    #[test]
    fn setpoint_without_argument_is_rejected() {
        assert_eq!(
            Command::parse(":SOUR:VOLT"),
            Err(CommandError::MissingArgument(":SOUR:VOLT".to_string()))
        );
        assert!(Command::parse(":SOUR:CURR ").is_err());
    }

    #[test]
    fn unparseable_argument_reads_as_zero() {
        assert_eq!(Command::parse(":SOUR:VOLT abc"), Ok(Command::SourceVoltage(0.0)));
    }

    #[test]
    fn unknown_action_is_ignored() {
        assert_eq!(Command::parse(":BOGUS:COMMAND"), Ok(Command::Ignored));
        assert!(!Command::Ignored.is_query());
        assert!(Command::UnknownQuery.is_query());
    }

    #[test]
    fn leading_float_prefix() {
        assert_eq!(parse_leading_float("1.5"), 1.5);
        assert_eq!(parse_leading_float("  -0.25V"), -0.25);
        assert_eq!(parse_leading_float("+3"), 3.0);
        assert_eq!(parse_leading_float(".5"), 0.5);
        assert_eq!(parse_leading_float("2."), 2.0);
        assert_eq!(parse_leading_float("1e-3A"), 0.001);
        assert_eq!(parse_leading_float("4e"), 4.0);
        assert_eq!(parse_leading_float("7E+x"), 7.0);
        assert_eq!(parse_leading_float("abc"), 0.0);
        assert_eq!(parse_leading_float("-"), 0.0);
        assert_eq!(parse_leading_float("."), 0.0);
        assert_eq!(parse_leading_float(""), 0.0);
    }
}
