// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static path dictionary: `string <-> u16` for ~170 well-known telemetry
//! paths, plus the delta-level encode/decode transforms that apply it.
//!
//! Encoding and decoding are pure functions over a [`crate::model::Delta`]:
//! neither mutates its input, and both always return a new delta with
//! `source` defaulted to an empty map on every update (the same
//! normalization [`crate::model::Delta::with_source_normalized`] performs
//! on its own, applied here so callers only need one function to get both
//! effects).

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::{Delta, PathKey, PathValue, Update};

/// Every path below is indexed sequentially within its numeric group; the
/// group (high byte) roughly mirrors SignalK's top-level namespaces so
/// related paths cluster together on the wire.
const NAVIGATION: &[&str] = &[
    "navigation.speedOverGround",
    "navigation.position",
    "navigation.courseOverGroundTrue",
    "navigation.courseOverGroundMagnetic",
    "navigation.headingTrue",
    "navigation.headingMagnetic",
    "navigation.magneticVariation",
    "navigation.rateOfTurn",
    "navigation.attitude",
    "navigation.state",
    "navigation.gnss.satellites",
    "navigation.gnss.antennaAltitude",
    "navigation.gnss.horizontalDilution",
    "navigation.gnss.positionDilution",
    "navigation.gnss.geoidalSeparation",
    "navigation.gnss.type",
    "navigation.gnss.methodQuality",
    "navigation.gnss.integrity",
    "navigation.log",
    "navigation.logTrip",
    "navigation.speedThroughWater",
    "navigation.trip.log",
    "navigation.datetime",
    "navigation.destination.waypoint",
    "navigation.destination.eta",
    "navigation.destination.bearingTrue",
    "navigation.destination.distance",
    "navigation.anchor.position",
    "navigation.anchor.currentRadius",
    "navigation.anchor.maxRadius",
    "navigation.racing.layline.distance",
    "navigation.racing.startLine.port",
    "navigation.racing.startLine.starboard",
];

const ELECTRICAL: &[&str] = &[
    "electrical.batteries.voltage",
    "electrical.batteries.current",
    "electrical.batteries.capacity.stateOfCharge",
    "electrical.batteries.capacity.stateOfHealth",
    "electrical.batteries.temperature",
    "electrical.batteries.capacity.timeRemaining",
    "electrical.chargers.chargingMode",
    "electrical.chargers.current",
    "electrical.chargers.voltage",
    "electrical.inverters.acOutput.voltage",
    "electrical.inverters.acOutput.current",
    "electrical.inverters.inverterMode",
    "electrical.solar.panelPower",
    "electrical.solar.panelVoltage",
    "electrical.solar.panelCurrent",
    "electrical.alternators.revolutions",
    "electrical.alternators.current",
    "electrical.switches.state",
    "electrical.ac.qualityReport.accepted",
];

const ENVIRONMENT: &[&str] = &[
    "environment.wind.speedApparent",
    "environment.wind.angleApparent",
    "environment.wind.speedTrue",
    "environment.wind.angleTrueWater",
    "environment.wind.directionTrue",
    "environment.water.temperature",
    "environment.water.swell.state",
    "environment.depth.belowTransducer",
    "environment.depth.belowKeel",
    "environment.depth.belowSurface",
    "environment.outside.temperature",
    "environment.outside.pressure",
    "environment.outside.humidity",
    "environment.inside.temperature",
    "environment.inside.humidity",
    "environment.inside.pressure",
    "environment.inside.refrigerator.temperature",
    "environment.current.drift",
    "environment.current.setTrue",
    "environment.mode",
    "environment.tide.heightHigh",
    "environment.tide.heightLow",
    "environment.tide.timeHigh",
    "environment.tide.timeLow",
];

const PROPULSION: &[&str] = &[
    "propulsion.revolutions",
    "propulsion.temperature",
    "propulsion.oilTemperature",
    "propulsion.oilPressure",
    "propulsion.coolantTemperature",
    "propulsion.coolantPressure",
    "propulsion.runTime",
    "propulsion.fuel.rate",
    "propulsion.fuel.pressure",
    "propulsion.fuel.used",
    "propulsion.exhaustTemperature",
    "propulsion.alternatorVoltage",
    "propulsion.transmission.gear",
    "propulsion.transmission.oilTemperature",
    "propulsion.transmission.oilPressure",
    "propulsion.throttle",
    "propulsion.trim",
    "propulsion.boostPressure",
];

const TANKS: &[&str] = &[
    "tanks.fuel.currentLevel",
    "tanks.fuel.currentVolume",
    "tanks.fuel.capacity",
    "tanks.freshWater.currentLevel",
    "tanks.freshWater.capacity",
    "tanks.wasteWater.currentLevel",
    "tanks.blackWater.currentLevel",
    "tanks.lubrication.currentLevel",
    "tanks.ballast.currentLevel",
];

const STEERING: &[&str] = &[
    "steering.rudderAngle",
    "steering.rudderAngleTarget",
    "steering.autopilot.state",
    "steering.autopilot.target.headingTrue",
    "steering.autopilot.target.headingMagnetic",
    "steering.autopilot.target.windAngleApparent",
    "steering.autopilot.mode",
];

const NOTIFICATIONS: &[&str] = &[
    "notifications.mob",
    "notifications.anchor",
    "notifications.engine.overTemperature",
    "notifications.engine.lowOilPressure",
    "notifications.battery.lowVoltage",
    "notifications.signalk-edge-link.linkFailover",
    "notifications.signalk-edge-link.linkDown",
];

const DESIGN: &[&str] = &[
    "design.length.overall",
    "design.length.waterline",
    "design.beam",
    "design.draft.maximum",
    "design.draft.current",
    "design.displacement",
    "design.airHeight",
    "design.keel.type",
    "design.rigging.type",
];

const PERFORMANCE: &[&str] = &[
    "performance.velocityMadeGood",
    "performance.targetSpeed",
    "performance.polarSpeed",
    "performance.polarSpeedRatio",
    "performance.tackMagnetic",
    "performance.gybeMagnetic",
    "performance.leeway",
    "performance.beatAngle",
    "performance.gybeAngle",
    "performance.currentPolarSpeed",
];

const GROUPS: &[&[&str]] = &[
    NAVIGATION,
    ELECTRICAL,
    ENVIRONMENT,
    PROPULSION,
    TANKS,
    STEERING,
    NOTIFICATIONS,
    DESIGN,
    PERFORMANCE,
];

fn build_tables() -> (HashMap<&'static str, u16>, HashMap<u16, &'static str>) {
    let mut forward = HashMap::new();
    let mut reverse = HashMap::new();
    for (group_idx, group) in GROUPS.iter().enumerate() {
        for (idx, path) in group.iter().enumerate() {
            let id = ((group_idx as u16 + 1) << 8) | (idx as u16 + 1);
            forward.insert(*path, id);
            reverse.insert(id, *path);
        }
    }
    (forward, reverse)
}

fn tables() -> &'static (HashMap<&'static str, u16>, HashMap<u16, &'static str>) {
    static TABLES: OnceLock<(HashMap<&'static str, u16>, HashMap<u16, &'static str>)> =
        OnceLock::new();
    TABLES.get_or_init(build_tables)
}

/// Strip one `.<digits>.` run into `.`, turning `electrical.batteries.1.voltage`
/// into `electrical.batteries.voltage`. Only the first such run is rewritten
/// per spec (a single retry after the direct-lookup miss).
fn strip_instance_segment(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'.' {
            let start = i;
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b'.' {
                let mut rewritten = String::with_capacity(path.len());
                rewritten.push_str(&path[..start]);
                rewritten.push('.');
                rewritten.push_str(&path[j + 1..]);
                return Some(rewritten);
            }
        }
        i += 1;
    }
    None
}

/// Encode a path name to its dictionary id. Unknown paths (even after the
/// wildcard retry) are returned unchanged.
#[must_use]
pub fn encode_path(name: &str) -> PathKey {
    let (forward, _) = tables();
    if let Some(&id) = forward.get(name) {
        return PathKey::Id(id);
    }
    if let Some(stripped) = strip_instance_segment(name) {
        if let Some(&id) = forward.get(stripped.as_str()) {
            return PathKey::Id(id);
        }
    }
    PathKey::Name(name.to_string())
}

/// Decode a dictionary id back to its path name. Anything that isn't a
/// known id (including an already-string `PathKey`) is returned unchanged.
#[must_use]
pub fn decode_path(key: &PathKey) -> PathKey {
    match key {
        PathKey::Id(id) => {
            let (_, reverse) = tables();
            match reverse.get(id) {
                Some(&name) => PathKey::Name(name.to_string()),
                None => PathKey::Id(*id),
            }
        }
        PathKey::Name(_) => key.clone(),
    }
}

fn transform_values(values: &[PathValue], f: impl Fn(&PathKey) -> PathKey) -> Vec<PathValue> {
    values
        .iter()
        .map(|pv| PathValue {
            path: f(&pv.path),
            value: pv.value.clone(),
        })
        .collect()
}

fn transform_updates(updates: &[Update], f: impl Fn(&PathKey) -> PathKey + Copy) -> Vec<Update> {
    updates
        .iter()
        .map(|u| Update {
            source: Some(u.source.clone().unwrap_or_default()),
            timestamp: u.timestamp.clone(),
            label: u.label.clone(),
            values: transform_values(&u.values, f),
        })
        .collect()
}

/// Encode every path in every update of `delta`, returning a new delta
/// with `source` normalized on every update.
#[must_use]
pub fn encode_delta(delta: &Delta) -> Delta {
    Delta {
        context: delta.context.clone(),
        updates: transform_updates(&delta.updates, |k| match k {
            PathKey::Name(name) => encode_path(name),
            PathKey::Id(_) => k.clone(),
        }),
    }
}

/// Decode every path in every update of `delta`, returning a new delta
/// with `source` normalized on every update.
#[must_use]
pub fn decode_delta(delta: &Delta) -> Delta {
    Delta {
        context: delta.context.clone(),
        updates: transform_updates(&delta.updates, decode_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_delta(path: PathKey) -> Delta {
        Delta {
            context: "vessels.self".into(),
            updates: vec![Update {
                source: None,
                timestamp: "2026-07-28T00:00:00Z".into(),
                label: None,
                values: vec![PathValue {
                    path,
                    value: json!(1.0),
                }],
            }],
        }
    }

    #[test]
    fn navigation_position_has_the_documented_id() {
        assert_eq!(encode_path("navigation.position"), PathKey::Id(0x0101));
    }

    #[test]
    fn unknown_path_passes_through_unchanged() {
        assert_eq!(
            encode_path("totally.made.up.path"),
            PathKey::Name("totally.made.up.path".into())
        );
    }

    #[test]
    fn wildcard_strips_instance_segment() {
        let with_instance = encode_path("electrical.batteries.1.voltage");
        let without_instance = encode_path("electrical.batteries.voltage");
        assert_eq!(with_instance, without_instance);
        assert!(matches!(with_instance, PathKey::Id(_)));
    }

    #[test]
    fn wildcard_still_falls_through_when_base_is_unknown() {
        let encoded = encode_path("totally.unknown.1.path");
        assert_eq!(encoded, PathKey::Name("totally.unknown.1.path".into()));
    }

    #[test]
    fn decode_of_unknown_id_is_unchanged() {
        assert_eq!(decode_path(&PathKey::Id(0xFFFF)), PathKey::Id(0xFFFF));
    }

    #[test]
    fn encode_then_decode_round_trips_known_path() {
        let delta = sample_delta(PathKey::Name("navigation.position".into()));
        let encoded = encode_delta(&delta);
        let decoded = decode_delta(&encoded);

        assert_eq!(
            decoded.updates[0].values[0].path,
            PathKey::Name("navigation.position".into())
        );
    }

    #[test]
    fn transform_normalizes_source_and_does_not_mutate_input() {
        let delta = sample_delta(PathKey::Name("navigation.position".into()));
        let encoded = encode_delta(&delta);

        assert!(delta.updates[0].source.is_none());
        assert_eq!(encoded.updates[0].source, Some(serde_json::Map::new()));
    }
}
