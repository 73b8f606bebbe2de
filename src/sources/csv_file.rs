//! CSV file source integration

use std::io::Read;

use csv::{Reader, StringRecord};
use geo::geometry::Point;
use time::format_description::well_known;
use time::OffsetDateTime;
use tracing::warn;

use super::{FieldsConfiguration, RecordedSource, SourceError};
use crate::Fix;

/// Recorded trip read from a CSV log
pub struct CsvSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: FieldsConfiguration,
}

impl<T> CsvSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            rdr,
            fields: fields.unwrap_or_default(),
        }
    }
}

impl<T> RecordedSource for CsvSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Fix>, SourceError> {
        let mut pos = vec![];

        let mut header = self
            .rdr
            .headers()
            .map_err(|e| SourceError::Read(format!("Failed on read the header: {}", e)))?
            .clone();
        let header_idx = parse_header(&self.fields, &mut header)?;

        for row in self.rdr.records() {
            let mut rec =
                row.map_err(|e| SourceError::Read(format!("Failed on read some row: {}", e)))?;

            if rec.len() < 2 {
                continue;
            }

            let fix = parse_row(&header_idx, &self.fields, &mut rec).map_err(|e| {
                SourceError::InvalidRecord(format!("Error with row {:?}: {}", rec, e))
            })?;

            match fix {
                Some(fix) if start <= fix.time && fix.time <= end => pos.push(fix),
                Some(_) => {}
                None => warn!(row = ?rec, "Skipping row without usable coordinates"),
            }
        }

        Ok(pos)
    }
}

/// Field to index map
#[derive(Debug)]
struct FieldsIndex {
    coordinates: usize,
    time: usize,
    speed: Option<usize>,
    elevation: Option<usize>,
}

fn parse_header(
    fields: &FieldsConfiguration,
    header: &mut StringRecord,
) -> Result<FieldsIndex, SourceError> {
    header.trim();

    let find = |name: &str| header.iter().position(|h| h.to_lowercase() == name);

    let coordinates = find(fields.coordinates.as_str())
        .ok_or_else(|| SourceError::InvalidRecord("Coordinates header not found".to_string()))?;
    let time = find(fields.time.as_str())
        .ok_or_else(|| SourceError::InvalidRecord("Time header not found".to_string()))?;

    Ok(FieldsIndex {
        coordinates,
        time,
        speed: find(fields.speed.as_str()),
        elevation: find(fields.elevation.as_str()),
    })
}

fn parse_row(
    header: &FieldsIndex,
    fields: &FieldsConfiguration,
    row: &mut StringRecord,
) -> Result<Option<Fix>, String> {
    row.trim();

    let raw_coordinates = row
        .get(header.coordinates)
        .ok_or("Coordinates field not found")?;
    let separator = match raw_coordinates {
        s if s.contains(',') => ",",
        s if s.contains(';') => ";",
        _ => " ",
    };
    let scoordinates: Vec<&str> = raw_coordinates
        .split(separator)
        .map(|s| s.trim())
        .collect();
    if scoordinates.len() != 2 {
        return Ok(None);
    }

    let (ilat, ilng) = if fields.flip_coordinates { (0, 1) } else { (1, 0) };

    let lat = scoordinates[ilat]
        .parse::<f64>()
        .map_err(|e| format!("Invalid latitude format: {}", e))?;
    let lng = scoordinates[ilng]
        .parse::<f64>()
        .map_err(|e| format!("Invalid longitude format: {}", e))?;

    let time = match row.get(header.time) {
        Some(d) => OffsetDateTime::parse(d, &well_known::Rfc3339)
            .map_err(|e| format!("Failed on parse the time: {}", e)),
        None => Err("Time field not found".to_string()),
    }?;

    let mut fix = Fix::basic(Point::new(lng, lat), time);

    if let Some(ispeed) = header.speed {
        fix.speed = row.get(ispeed).and_then(|d| d.parse::<f64>().ok());
    }

    if let Some(ielevation) = header.elevation {
        fix.altitude = row.get(ielevation).and_then(|d| d.parse::<f64>().ok());
    }

    Ok(Some(fix))
}
