//! Built-in traffic-camera queries.
//!
//! Coordinates are in pixels of 1920x1080 frames.

use pathq_models::{Polygon, Rect};

use crate::error::PredicateResult;
use crate::predicate::Predicate;
use crate::registry::{PredicateRegistry, RegistryBuilder};

impl PredicateRegistry {
    /// Registry holding the built-in catalogue only.
    pub fn builtin() -> PredicateResult<Self> {
        let mut builder = Self::builder();
        register_builtin(&mut builder)?;
        Ok(builder.build())
    }
}

/// Add the built-in catalogue to `builder`.
pub fn register_builtin(builder: &mut RegistryBuilder) -> PredicateResult<()> {
    // UAV: vehicles entering bottom-left, leaving top-right.
    builder.primitive(
        "uav",
        Predicate::StartEnd {
            start: Rect::new(362.0, 446.0, 706.0, 1080.0).to_polygon(),
            end: Rect::new(784.0, 176.0, 1920.0, 642.0).to_polygon(),
        },
    )?;

    // Warsaw intersection.
    builder.primitive(
        "warsawlr",
        Predicate::Waypoint(vec![
            Rect::new(0.0, 610.0, 930.0, 1080.0).to_polygon(),
            Rect::new(1190.0, 700.0, 1920.0, 1080.0).to_polygon(),
        ]),
    )?;
    builder.primitive(
        "warsawtb",
        Predicate::Waypoint(vec![
            Polygon::from_coords(&[
                (978.0, 337.0),
                (1150.0, 680.0),
                (1450.0, 680.0),
                (1580.0, 590.0),
                (1107.0, 325.0),
            ])?,
            Polygon::from_coords(&[
                (1920.0, 685.0),
                (1645.0, 669.0),
                (1400.0, 780.0),
                (1573.0, 1080.0),
                (1920.0, 1080.0),
            ])?,
        ]),
    )?;
    builder.primitive(
        "warsawhw",
        Predicate::Waypoint(vec![
            Polygon::from_coords(&[
                (1314.0, 403.0),
                (901.0, 253.0),
                (978.0, 202.0),
                (1390.0, 333.0),
            ])?,
            Polygon::from_coords(&[
                (1558.0, 393.0),
                (1491.0, 466.0),
                (1920.0, 680.0),
                (1920.0, 550.0),
            ])?,
        ]),
    )?;
    builder.any_of("warsaw", &["warsawlr", "warsawtb", "warsawhw"])?;

    // Shibuya crossing, one start/end query per approach pair.
    let right = Polygon::from_coords(&[
        (1332.0, 0.0),
        (1332.0, 440.0),
        (1614.0, 550.0),
        (1920.0, 550.0),
        (1920.0, 0.0),
    ])?;
    let left = Polygon::from_coords(&[(0.0, 525.0), (500.0, 525.0), (800.0, 1080.0), (0.0, 1080.0)])?;
    let top = Polygon::from_coords(&[
        (0.0, 525.0),
        (550.0, 525.0),
        (1200.0, 420.0),
        (1200.0, 0.0),
        (0.0, 0.0),
    ])?;
    let bottom = Polygon::from_coords(&[
        (1920.0, 630.0),
        (1640.0, 630.0),
        (1040.0, 1080.0),
        (1920.0, 1080.0),
    ])?;

    let pairs = [
        ("shibuyabt", &bottom, &top),
        ("shibuyabl", &bottom, &left),
        ("shibuyarl", &right, &left),
        ("shibuyart", &right, &top),
        ("shibuyarb", &right, &bottom),
    ];
    for (name, start, end) in pairs {
        builder.primitive(
            name,
            Predicate::StartEnd {
                start: start.clone(),
                end: end.clone(),
            },
        )?;
    }
    builder.any_of(
        "shibuya",
        &["shibuyabt", "shibuyabl", "shibuyarl", "shibuyart", "shibuyarb"],
    )?;

    Ok(())
}
