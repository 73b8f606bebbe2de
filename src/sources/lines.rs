//! Line protocol used by the live mode

use super::SourceError;
use crate::Fix;

/// Lifecycle request typed on a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeterCommand {
    Start,
    Pause,
    Stop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LineInput {
    Fix(Fix),
    Command(MeterCommand),
    Blank,
}

/// Parse `lat,lng[,speed_mps]` or one of `start`, `resume`, `pause`, `stop`
pub fn parse_line(line: &str) -> Result<LineInput, SourceError> {
    let line = line.trim();

    match line.to_lowercase().as_str() {
        "" => return Ok(LineInput::Blank),
        "start" | "resume" => return Ok(LineInput::Command(MeterCommand::Start)),
        "pause" => return Ok(LineInput::Command(MeterCommand::Pause)),
        "stop" => return Ok(LineInput::Command(MeterCommand::Stop)),
        _ => {}
    }

    let separator = match line {
        s if s.contains(',') => ',',
        s if s.contains(';') => ';',
        _ => ' ',
    };
    let fields: Vec<&str> = line
        .split(separator)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if fields.len() < 2 || fields.len() > 3 {
        return Err(SourceError::InvalidRecord(format!("Unrecognized line `{}`", line)));
    }

    let number = |name: &str, raw: &str| -> Result<f64, SourceError> {
        let value = raw
            .parse::<f64>()
            .map_err(|e| SourceError::InvalidRecord(format!("Invalid {} format: {}", name, e)))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(SourceError::InvalidRecord(format!("{} must be finite", name)))
        }
    };

    let lat = number("latitude", fields[0])?;
    let lng = number("longitude", fields[1])?;

    let mut fix = Fix::at(lat, lng);
    if let Some(raw) = fields.get(2) {
        fix.speed = Some(number("speed", raw)?);
    }

    Ok(LineInput::Fix(fix))
}

#[cfg(test)]
mod tests {
    use super::{parse_line, LineInput, MeterCommand};
    use crate::sources::SourceError;

    #[test]
    fn commands() -> Result<(), SourceError> {
        assert_eq!(LineInput::Command(MeterCommand::Start), parse_line("start")?);
        assert_eq!(LineInput::Command(MeterCommand::Start), parse_line(" Resume ")?);
        assert_eq!(LineInput::Command(MeterCommand::Pause), parse_line("pause")?);
        assert_eq!(LineInput::Command(MeterCommand::Stop), parse_line("STOP")?);
        assert_eq!(LineInput::Blank, parse_line("   ")?);

        Ok(())
    }

    #[test]
    fn fixes() -> Result<(), SourceError> {
        match parse_line("35.6762, 139.6503")? {
            LineInput::Fix(fix) => {
                assert_eq!(35.6762, fix.lat());
                assert_eq!(139.6503, fix.lng());
                assert_eq!(None, fix.speed);
            }
            other => return Err(SourceError::InvalidRecord(format!("{:?}", other))),
        }

        match parse_line("35.6762;139.6503;8.5")? {
            LineInput::Fix(fix) => assert_eq!(Some(8.5), fix.speed),
            other => return Err(SourceError::InvalidRecord(format!("{:?}", other))),
        }

        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_line("35.6762").is_err());
        assert!(parse_line("north,east").is_err());
        assert!(parse_line("NaN,139.6503").is_err());
        assert!(parse_line("1,2,3,4").is_err());
    }
}
