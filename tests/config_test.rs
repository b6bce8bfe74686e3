use inkflow::{ConfigError, SimulationParameters, SurfaceSize};
use std::path::Path;

#[test]
fn test_defaults() {
    let params = SimulationParameters::default();
    assert_eq!(params.sim_resolution, 128);
    assert_eq!(params.dye_resolution, 1024);
    assert_eq!(params.density_dissipation, 0.98);
    assert_eq!(params.velocity_dissipation, 0.99);
    assert_eq!(params.pressure_iterations, 20);
    assert_eq!(params.splat_radius, 0.25);
    assert_eq!(params.splat_force, 6000.0);
    assert_eq!(params.color_seed, None);
    assert!(params.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let params = SimulationParameters::from_json_str(
        r#"{ "simResolution": 64, "pressureIterations": 40, "colorSeed": 9 }"#,
    )
    .unwrap();
    assert_eq!(params.sim_resolution, 64);
    assert_eq!(params.pressure_iterations, 40);
    assert_eq!(params.color_seed, Some(9));
    assert_eq!(params.dye_resolution, 1024);
    assert_eq!(params.density_dissipation, 0.98);
}

#[test]
fn test_out_of_range_value_names_the_key() {
    let err = SimulationParameters::from_json_str(r#"{ "densityDissipation": 1.2 }"#).unwrap_err();
    match err {
        ConfigError::Invalid { name, .. } => assert_eq!(name, "densityDissipation"),
        other => panic!("unexpected error: {other}"),
    }

    let zero = SimulationParameters {
        pressure_iterations: 0,
        ..SimulationParameters::default()
    };
    assert!(matches!(
        zero.validate(),
        Err(ConfigError::Invalid { name: "pressureIterations", .. })
    ));

    let negative = SimulationParameters {
        dt_ceiling: -0.1,
        ..SimulationParameters::default()
    };
    assert!(negative.validate().is_err());
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let err = SimulationParameters::from_json_str("{ simResolution: }").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_json_round_trip() {
    let params = SimulationParameters {
        dye_resolution: 512,
        color_seed: Some(123),
        ..SimulationParameters::default()
    };
    let json = params.to_json_string().unwrap();
    assert!(json.contains("\"dyeResolution\": 512"));
    assert_eq!(SimulationParameters::from_json_str(&json).unwrap(), params);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = SimulationParameters::from_path(Path::new("/nonexistent/inkflow.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_surface_from_logical_size() {
    let surface = SurfaceSize::from_logical(100.0, 50.0, 2.0);
    assert_eq!((surface.width, surface.height), (200, 100));
    assert_eq!(surface.device_pixel_ratio, 2.0);
    assert_eq!(surface.aspect_ratio(), 2.0);

    assert_eq!(SurfaceSize::new(300, 600).aspect_ratio(), 0.5);
}

#[test]
fn test_surface_with_zero_side_is_invalid() {
    let tall = SurfaceSize {
        width: 0,
        height: 480,
        device_pixel_ratio: 1.0,
    };
    assert!(matches!(
        tall.validate(),
        Err(ConfigError::Invalid { name: "surface", .. })
    ));

    let no_ratio = SurfaceSize {
        device_pixel_ratio: 0.0,
        ..SurfaceSize::new(640, 480)
    };
    assert!(matches!(
        no_ratio.validate(),
        Err(ConfigError::Invalid { name: "devicePixelRatio", .. })
    ));

    assert!(SurfaceSize::new(640, 480).validate().is_ok());
    assert!(SurfaceSize::from_logical(0.0, 0.0, 2.0).validate().is_ok());
}

#[test]
fn test_dye_resolution_fits_the_surface() {
    let params = SimulationParameters::default();
    let fitted = params.fitted_to(&SurfaceSize::from_logical(150.0, 100.0, 2.0));
    assert_eq!(fitted.dye_resolution, 200);
    assert_eq!(fitted.sim_resolution, params.sim_resolution);

    let coarse = SimulationParameters {
        dye_resolution: 128,
        ..SimulationParameters::default()
    };
    assert_eq!(coarse.fitted_to(&SurfaceSize::new(300, 200)).dye_resolution, 128);
}
