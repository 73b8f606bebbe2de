//! GPX export of recorded trips

use std::io::Write;

use gpx::{Gpx, GpxVersion, Track};

use super::state::TripReceipt;

pub struct GpxGenerator {
    pub tracks: Vec<Track>,
}

impl GpxGenerator {
    pub fn empty() -> Self {
        Self { tracks: vec![] }
    }

    /// Trip route, with the fare summary as track description
    pub fn from_receipt(receipt: &TripReceipt) -> Self {
        let mut track = receipt.route.clone();
        track.description = Some(format!(
            "fare {} for {} ms and {:.0} m",
            receipt.fare, receipt.elapsed_millis, receipt.total_distance_meters
        ));

        Self {
            tracks: vec![track],
        }
    }

    pub fn generate(self) -> Gpx {
        let mut gpx: Gpx = Default::default();
        gpx.version = GpxVersion::Gpx11;
        gpx.creator = Some("tripmeter".to_string());
        gpx.tracks = self.tracks;

        gpx
    }

    pub fn write<W: Write>(self, writer: W) -> Result<(), String> {
        let doc = self.generate();

        gpx::write(&doc, writer).map_err(|e| format!("Failed on write the GPX: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use time::macros::datetime;

    use super::GpxGenerator;
    use crate::meter::position::Fix;
    use crate::meter::replay::TripReplay;
    use crate::meter::tariff::Tariff;

    #[test]
    fn receipt_export() -> Result<(), String> {
        let p1 = Fix::basic(Point::new(-48.8702222, -26.31832), datetime!(2021-05-24 0:00 UTC));
        let p2 = Fix::basic(Point::new(-48.8619776, -26.3185919), datetime!(2021-05-24 0:05 UTC));

        let receipt = TripReplay::new(Tariff::default())
            .run(vec![p1.clone(), p2])
            .ok_or("no receipt")?;

        let doc = GpxGenerator::from_receipt(&receipt).generate();
        assert_eq!(Some("tripmeter".to_string()), doc.creator);
        assert_eq!(1, doc.tracks.len());
        assert_eq!(Some("trip".to_string()), doc.tracks[0].name);
        assert_eq!(2, doc.tracks[0].segments[0].points.len());
        assert_eq!(p1.coordinates, doc.tracks[0].segments[0].points[0].point());
        assert_eq!(Some(p1.time.into()), doc.tracks[0].segments[0].points[0].time);

        let mut out = vec![];
        GpxGenerator::from_receipt(&receipt).write(&mut out)?;
        let xml = String::from_utf8(out).map_err(|e| e.to_string())?;
        assert!(xml.contains("<trkpt"));

        Ok(())
    }
}
