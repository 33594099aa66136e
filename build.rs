fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/gtfs-realtime.proto");

    let protoc_path = protoc_bin_vendored::protoc_bin_path()?;

    unsafe {
        std::env::set_var("PROTOC", protoc_path);
    }

    // The same generated types back both wire formats, so they carry serde
    // derives. Enum fields are rendered by name in JSON (see feed::enum_names).
    let mut config = prost_build::Config::new();
    config
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .message_attribute(".", "#[serde(default)]");

    for (field, module) in [
        (".transit_realtime.FeedHeader.incrementality", "incrementality"),
        (".transit_realtime.Alert.cause", "cause"),
        (".transit_realtime.Alert.effect", "effect"),
        (".transit_realtime.Alert.severity_level", "severity_level"),
        (".transit_realtime.TripDescriptor.schedule_relationship", "schedule_relationship"),
        (
            ".transit_realtime.TripUpdate.StopTimeUpdate.schedule_relationship",
            "stop_time_schedule_relationship",
        ),
        (
            ".transit_realtime.TripUpdate.StopTimeUpdate.departure_occupancy_status",
            "occupancy_status",
        ),
        (
            ".transit_realtime.TripUpdate.StopTimeUpdate.StopTimeProperties.pickup_type",
            "drop_off_pickup_type",
        ),
        (
            ".transit_realtime.TripUpdate.StopTimeUpdate.StopTimeProperties.drop_off_type",
            "drop_off_pickup_type",
        ),
        (".transit_realtime.VehiclePosition.current_status", "vehicle_stop_status"),
        (".transit_realtime.VehiclePosition.congestion_level", "congestion_level"),
        (".transit_realtime.VehiclePosition.occupancy_status", "occupancy_status"),
        (
            ".transit_realtime.VehiclePosition.CarriageDetails.occupancy_status",
            "occupancy_status",
        ),
        (
            ".transit_realtime.VehicleDescriptor.wheelchair_accessible",
            "wheelchair_accessible",
        ),
        (".transit_realtime.Stop.wheelchair_boarding", "wheelchair_boarding"),
    ] {
        config.field_attribute(
            field,
            format!("#[serde(with = \"crate::feed::enum_names::{module}\")]"),
        );
    }

    config.compile_protos(&["proto/gtfs-realtime.proto"], &["proto/"])?;

    Ok(())
}
