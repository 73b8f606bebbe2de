//! GPX file source integration

use std::io::Read;

use time::format_description::well_known;
use time::OffsetDateTime;
use tracing::warn;

use super::{RecordedSource, SourceError};
use crate::Fix;

/// Recorded trip read from a GPX document; only timed track points count
pub struct GpxSource<T>
where
    T: Read,
{
    rdr: Option<T>,
}

impl<T> GpxSource<T>
where
    T: Read,
{
    pub fn new(rdr: T) -> Self {
        Self { rdr: Some(rdr) }
    }
}

impl<T> RecordedSource for GpxSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Fix>, SourceError> {
        let rdr = self
            .rdr
            .take()
            .ok_or_else(|| SourceError::Read("GPX document already consumed".to_string()))?;

        let doc = gpx::read(rdr)
            .map_err(|e| SourceError::Read(format!("Failed on parse the GPX: {}", e)))?;

        let mut pos = vec![];

        for track in doc.tracks {
            for seg in track.segments {
                for wp in seg.points {
                    let raw = match wp.time.map(|t| t.format()) {
                        Some(Ok(raw)) => raw,
                        Some(Err(error)) => {
                            warn!(%error, "Skipping track point with unformattable time");
                            continue;
                        }
                        None => continue,
                    };

                    let time = match OffsetDateTime::parse(&raw, &well_known::Rfc3339) {
                        Ok(time) => time,
                        Err(error) => {
                            warn!(%error, time = %raw, "Skipping track point with invalid time");
                            continue;
                        }
                    };

                    if time < start || end < time {
                        continue;
                    }

                    let mut fix = Fix::basic(wp.point(), time);
                    fix.speed = wp.speed;
                    fix.altitude = wp.elevation;

                    pos.push(fix);
                }
            }
        }

        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::GpxSource;
    use crate::sources::{RecordedSource, SourceError};

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="-26.31832" lon="-48.8702222"><time>2019-10-01T00:01:00Z</time></trkpt>
      <trkpt lat="-26.3185919" lon="-48.8619776"><time>2019-10-01T00:02:00Z</time></trkpt>
      <trkpt lat="-26.3185861" lon="-48.8619871"></trkpt>
      <trkpt lat="-26.3185861" lon="-48.8619871"><time>2019-10-03T00:02:00Z</time></trkpt>
      <trkpt lat="-26.3186" lon="-48.862"><time>2019-10-01T03:03:30+03:00</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn timed_points_within_window() -> Result<(), SourceError> {
        let mut source = GpxSource::new(DOC.as_bytes());

        let fixes = source.fetch(datetime!(2019-10-01 0:00 UTC), datetime!(2019-10-02 0:00 UTC))?;
        assert_eq!(3, fixes.len());
        assert_eq!(-26.31832, fixes[0].lat());
        assert_eq!(-48.8702222, fixes[0].lng());
        assert_eq!(datetime!(2019-10-01 0:01 UTC), fixes[0].time);
        assert_eq!(datetime!(2019-10-01 0:02 UTC), fixes[1].time);
        assert_eq!(datetime!(2019-10-01 0:03:30 UTC), fixes[2].time);

        Ok(())
    }

    #[test]
    fn consumed_once() -> Result<(), SourceError> {
        let mut source = GpxSource::new(DOC.as_bytes());
        source.fetch(datetime!(2019-10-01 0:00 UTC), datetime!(2019-10-02 0:00 UTC))?;

        assert!(source
            .fetch(datetime!(2019-10-01 0:00 UTC), datetime!(2019-10-02 0:00 UTC))
            .is_err());

        Ok(())
    }
}
