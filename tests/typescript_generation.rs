//! TypeScript Generation Tests
//!
//! Validates that wire types can be exported to TypeScript when the tauri
//! feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_wire_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<lapsync::StatusSnapshot>();
    assert_type::<lapsync::LapRecord>();
    assert_type::<lapsync::RaceState>();
    assert_type::<lapsync::Command>();
    assert_type::<lapsync::ConnectionState>();
    assert_type::<lapsync::SessionId>();
    assert_type::<lapsync::UpdateRate>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = lapsync::UpdateRate::Native;
    let _ = lapsync::Command::GetStatus;
}
