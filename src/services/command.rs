//! Inbound SMS command parsing.
//!
//! The command vocabulary is the wire protocol between hikers and the
//! service and must stay stable: `CAST`, `CAST7`, `CAST12`, `DELAY`, `DONE`,
//! `UNITS METRIC|IMPERIAL`, `HELP`, or a bare waypoint code to check in.
//!
//! Parsing is total: every input maps to exactly one `Command`, never an
//! error. Case and surrounding whitespace are ignored. Coordinate range
//! checking is deliberately left to the dispatcher, which turns it into a
//! corrective reply.

use crate::helpers::UnitSystem;
use crate::services::providers::Horizon;

/// What a CAST should forecast.
#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    /// No argument: the sender's whole active route.
    ActiveRoute,
    /// Explicit GPS position.
    Coords { lat: f64, lon: f64 },
    /// A waypoint code (validated against the route at dispatch).
    Waypoint(String),
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Cast {
        horizon: Horizon,
        target: CastTarget,
    },
    Delay,
    Done,
    SetUnits(UnitSystem),
    Checkin(String),
    Help,
    Unknown(String),
}

fn is_waypoint_code(token: &str) -> bool {
    token.len() == 5 && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse coordinates of the form `<lat>,<lon>` (whitespace around the comma
/// tolerated). Range is not checked here.
fn parse_coords(arg: &str) -> Option<(f64, f64)> {
    let (lat, lon) = arg.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// Classify one inbound message against the sender's known waypoint codes.
pub fn parse(text: &str, known_codes: &[String]) -> Command {
    let raw = text.trim();
    let upper = raw.to_uppercase();
    let tokens: Vec<&str> = upper.split_whitespace().collect();

    let unknown = || Command::Unknown(raw.to_string());

    let [first, rest @ ..] = tokens.as_slice() else {
        return unknown();
    };

    // Check-in takes priority: the whole message is exactly one known code
    if rest.is_empty() && is_waypoint_code(first) && known_codes.iter().any(|c| c == first) {
        return Command::Checkin(first.to_string());
    }

    let horizon = match *first {
        "CAST" => Some(Horizon::Short),
        "CAST7" => Some(Horizon::Week),
        "CAST12" => Some(Horizon::Half),
        _ => None,
    };
    if let Some(horizon) = horizon {
        let target = match rest {
            [] => CastTarget::ActiveRoute,
            _ => {
                let arg = rest.join(" ");
                if let Some((lat, lon)) = parse_coords(&arg) {
                    CastTarget::Coords { lat, lon }
                } else if rest.len() == 1 && is_waypoint_code(rest[0]) {
                    CastTarget::Waypoint(rest[0].to_string())
                } else {
                    return unknown();
                }
            }
        };
        return Command::Cast { horizon, target };
    }

    match tokens.as_slice() {
        ["DELAY"] => Command::Delay,
        ["DONE"] => Command::Done,
        ["UNITS", system] => match UnitSystem::parse(system) {
            Some(units) => Command::SetUnits(units),
            None => unknown(),
        },
        ["HELP"] => Command::Help,
        _ => unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> Vec<String> {
        vec!["LAKEO".to_string(), "NORTH".to_string()]
    }

    #[test]
    fn test_checkin_known_code() {
        assert_eq!(parse("LAKEO", &codes()), Command::Checkin("LAKEO".to_string()));
        assert_eq!(parse("  lakeo  ", &codes()), Command::Checkin("LAKEO".to_string()));
    }

    #[test]
    fn test_unknown_code_is_not_checkin() {
        assert_eq!(
            parse("BANAN", &codes()),
            Command::Unknown("BANAN".to_string())
        );
    }

    #[test]
    fn test_cast_plain() {
        assert_eq!(
            parse("CAST", &codes()),
            Command::Cast {
                horizon: Horizon::Short,
                target: CastTarget::ActiveRoute
            }
        );
    }

    #[test]
    fn test_cast7_with_coords() {
        assert_eq!(
            parse("CAST7 37.7459,-119.5332", &codes()),
            Command::Cast {
                horizon: Horizon::Week,
                target: CastTarget::Coords {
                    lat: 37.7459,
                    lon: -119.5332
                }
            }
        );
    }

    #[test]
    fn test_cast_coords_with_space_after_comma() {
        assert_eq!(
            parse("cast12 61.63, 8.31", &codes()),
            Command::Cast {
                horizon: Horizon::Half,
                target: CastTarget::Coords { lat: 61.63, lon: 8.31 }
            }
        );
    }

    #[test]
    fn test_cast_with_waypoint_code() {
        assert_eq!(
            parse("cast NORTH", &codes()),
            Command::Cast {
                horizon: Horizon::Short,
                target: CastTarget::Waypoint("NORTH".to_string())
            }
        );
    }

    #[test]
    fn test_cast_with_unregistered_code_still_parses() {
        // Validation against the route happens at dispatch
        assert_eq!(
            parse("CAST ZZZZZ", &codes()),
            Command::Cast {
                horizon: Horizon::Short,
                target: CastTarget::Waypoint("ZZZZZ".to_string())
            }
        );
    }

    #[test]
    fn test_cast_with_garbage_argument() {
        assert_eq!(
            parse("CAST next tuesday", &codes()),
            Command::Unknown("CAST next tuesday".to_string())
        );
    }

    #[test]
    fn test_cast_out_of_range_coords_still_parse() {
        // The dispatcher rejects these with a corrective reply
        assert_eq!(
            parse("CAST 95.0,200.0", &codes()),
            Command::Cast {
                horizon: Horizon::Short,
                target: CastTarget::Coords { lat: 95.0, lon: 200.0 }
            }
        );
    }

    #[test]
    fn test_delay_done_help() {
        assert_eq!(parse("DELAY", &codes()), Command::Delay);
        assert_eq!(parse("done", &codes()), Command::Done);
        assert_eq!(parse(" Help ", &codes()), Command::Help);
    }

    #[test]
    fn test_delay_with_trailing_junk_is_unknown() {
        assert_eq!(
            parse("DELAY 3 days", &codes()),
            Command::Unknown("DELAY 3 days".to_string())
        );
    }

    #[test]
    fn test_units() {
        assert_eq!(
            parse("UNITS METRIC", &codes()),
            Command::SetUnits(UnitSystem::Metric)
        );
        assert_eq!(
            parse("units imperial", &codes()),
            Command::SetUnits(UnitSystem::Imperial)
        );
        assert_eq!(
            parse("UNITS FURLONGS", &codes()),
            Command::Unknown("UNITS FURLONGS".to_string())
        );
    }

    #[test]
    fn test_banana_is_unknown() {
        assert_eq!(
            parse("BANANA", &codes()),
            Command::Unknown("BANANA".to_string())
        );
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(parse("   ", &codes()), Command::Unknown("".to_string()));
    }

    #[test]
    fn test_unknown_preserves_raw_text() {
        assert_eq!(
            parse("  where am i?  ", &codes()),
            Command::Unknown("where am i?".to_string())
        );
    }
}
