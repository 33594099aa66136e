//! Serde adapters that render GTFS-RT enum fields by their proto names
//! (`"UNKNOWN_CAUSE"`) in JSON feeds, while the prost structs keep them as
//! raw `Option<i32>`. Numbers are accepted on input and unknown values are
//! written back as numbers so nothing is lost on a round trip.

macro_rules! enum_by_name {
    ($module:ident, $enum:ty) => {
        pub mod $module {
            use serde::de::Error;
            use serde::{Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(
                value: &Option<i32>,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                match value {
                    None => serializer.serialize_none(),
                    Some(raw) => match <$enum>::try_from(*raw) {
                        Ok(known) => serializer.serialize_str(known.as_str_name()),
                        Err(_) => serializer.serialize_i32(*raw),
                    },
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Option<i32>, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Number(i32),
                    Name(String),
                }

                match Option::<Raw>::deserialize(deserializer)? {
                    None => Ok(None),
                    Some(Raw::Number(n)) => Ok(Some(n)),
                    Some(Raw::Name(name)) => <$enum>::from_str_name(&name)
                        .map(|known| Some(known as i32))
                        .ok_or_else(|| D::Error::custom(format!("unknown enum value '{name}'"))),
                }
            }
        }
    };
}

enum_by_name!(incrementality, crate::gtfs_rt::feed_header::Incrementality);
enum_by_name!(cause, crate::gtfs_rt::alert::Cause);
enum_by_name!(effect, crate::gtfs_rt::alert::Effect);
enum_by_name!(severity_level, crate::gtfs_rt::alert::SeverityLevel);
enum_by_name!(
    schedule_relationship,
    crate::gtfs_rt::trip_descriptor::ScheduleRelationship
);
enum_by_name!(
    stop_time_schedule_relationship,
    crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship
);
enum_by_name!(
    drop_off_pickup_type,
    crate::gtfs_rt::trip_update::stop_time_update::stop_time_properties::DropOffPickupType
);
enum_by_name!(
    vehicle_stop_status,
    crate::gtfs_rt::vehicle_position::VehicleStopStatus
);
enum_by_name!(congestion_level, crate::gtfs_rt::vehicle_position::CongestionLevel);
enum_by_name!(occupancy_status, crate::gtfs_rt::vehicle_position::OccupancyStatus);
enum_by_name!(
    wheelchair_accessible,
    crate::gtfs_rt::vehicle_descriptor::WheelchairAccessible
);
enum_by_name!(wheelchair_boarding, crate::gtfs_rt::stop::WheelchairBoarding);
