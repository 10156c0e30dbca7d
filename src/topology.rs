//! Static fleet topology: locations, stations, and charge points.

use crate::sink::{Record, Row};

/// Geographic site hosting one or more stations.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub city: &'static str,
    pub state: &'static str,
}

impl Location {
    pub const COLLECTION: &'static str = "locations";
}

impl Record for Location {
    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("latitude", self.latitude)
            .with("longitude", self.longitude)
            .with("city", self.city)
            .with("state", self.state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: u32,
    pub name: &'static str,
    pub location_id: u32,
}

impl Station {
    pub const COLLECTION: &'static str = "stations";
}

impl Record for Station {
    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("name", self.name)
            .with("location_id", self.location_id)
    }
}

/// Identity of one simulated charge point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargePointIdentity {
    pub id: u32,
    pub name: String,
    pub station_id: u32,
}

impl ChargePointIdentity {
    pub const COLLECTION: &'static str = "chargepoints";

    pub fn new(id: u32, name: impl Into<String>, station_id: u32) -> Self {
        Self {
            id,
            name: name.into(),
            station_id,
        }
    }
}

impl Record for ChargePointIdentity {
    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("station_id", self.station_id)
    }
}

/// The full fleet, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub locations: Vec<Location>,
    pub stations: Vec<Station>,
    pub charge_points: Vec<ChargePointIdentity>,
}

impl Topology {
    /// Built-in fleet: five sites in Hamburg and Cologne, 15 charge points.
    pub fn builtin() -> Self {
        let locations = vec![
            Location {
                id: 1,
                latitude: 53.554_973_7,
                longitude: 10.008_021_1,
                city: "Hamburg",
                state: "Hamburg",
            },
            Location {
                id: 2,
                latitude: 53.54,
                longitude: 10.0122,
                city: "Hamburg",
                state: "Hamburg",
            },
            Location {
                id: 3,
                latitude: 53.634_166_7,
                longitude: 10.0075,
                city: "Hamburg",
                state: "Hamburg",
            },
            Location {
                id: 4,
                latitude: 50.941_944_4,
                longitude: 6.961_666_66,
                city: "Cologne",
                state: "NRW",
            },
            Location {
                id: 5,
                latitude: 50.9275,
                longitude: 6.928_88,
                city: "Cologne",
                state: "NRW",
            },
        ];

        let stations = vec![
            Station {
                id: 1,
                name: "Hamburg_HBF",
                location_id: 1,
            },
            Station {
                id: 2,
                name: "Hamburg_HafenCity_Uni",
                location_id: 2,
            },
            Station {
                id: 3,
                name: "Hamburg_Airport",
                location_id: 3,
            },
            Station {
                id: 4,
                name: "Cologne_HBF",
                location_id: 4,
            },
            Station {
                id: 5,
                name: "Cologne_Uni",
                location_id: 5,
            },
        ];

        // (station id, number of charge points)
        let layout = [(1, 5), (2, 1), (3, 3), (4, 5), (5, 1)];
        let mut charge_points = Vec::new();
        for (station_id, count) in layout {
            let station = &stations[station_id as usize - 1];
            for suffix in ('A'..='Z').take(count) {
                let id = charge_points.len() as u32 + 1;
                charge_points.push(ChargePointIdentity::new(
                    id,
                    format!("{}_{suffix}", station.name),
                    station_id,
                ));
            }
        }

        Self {
            locations,
            stations,
            charge_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fleet_has_fifteen_charge_points() {
        let topology = Topology::builtin();
        assert_eq!(topology.charge_points.len(), 15);
        assert_eq!(topology.charge_points[0].name, "Hamburg_HBF_A");
        assert_eq!(topology.charge_points[5].name, "Hamburg_HafenCity_Uni_A");
        assert_eq!(topology.charge_points[14].name, "Cologne_Uni_A");
    }

    #[test]
    fn cologne_hbf_coordinates() {
        let topology = Topology::builtin();
        let location = &topology.locations[3];
        assert_eq!(location.city, "Cologne");
        assert_eq!(location.latitude, 50.941_944_4);
        assert_eq!(location.longitude, 6.961_666_66);
    }

    #[test]
    fn charge_point_ids_are_unique_and_reference_known_stations() {
        let topology = Topology::builtin();
        let mut ids: Vec<u32> = topology.charge_points.iter().map(|cp| cp.id).collect();
        ids.dedup();
        assert_eq!(ids, (1..=15).collect::<Vec<_>>());
        for cp in &topology.charge_points {
            assert!(topology.stations.iter().any(|s| s.id == cp.station_id));
        }
    }
}
